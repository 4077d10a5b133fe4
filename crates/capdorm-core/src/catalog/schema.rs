//! Schema introspection: column descriptors derived from record shapes.

use super::naming::to_snake;
use super::record::{FieldKind, FieldShape, ForeignKey, Record};
use super::value::{FieldError, Value};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Ordered field selectors leading from a record to one of its columns.
///
/// The path has more than one element only for columns reached through
/// embedded records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<&'static str>);

impl FieldPath {
    /// The empty path (the record itself).
    pub fn root() -> Self {
        Self::default()
    }

    /// This path extended by one field.
    pub fn child(&self, field: &'static str) -> Self {
        let mut selectors = self.0.clone();
        selectors.push(field);
        Self(selectors)
    }

    /// Field selectors in order.
    pub fn as_slice(&self) -> &[&'static str] {
        &self.0
    }

    /// The final field selector.
    pub fn leaf(&self) -> Option<&'static str> {
        self.0.last().copied()
    }

    /// Number of selectors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Maps one table column to a field inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name (snake_case of the field name).
    pub name: String,
    /// Access path into the record.
    pub path: FieldPath,
    /// Whether storage assigns this column on insert.
    pub is_primary_key: bool,
}

/// A column whose value decides a permission, and the record type whose
/// grants it is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Determiner {
    /// Index into [`RecordSchema::columns`].
    pub column: usize,
    /// Record type the column's value identifies.
    pub record: &'static str,
    /// Id field of that record type.
    pub field: &'static str,
}

/// The derived mapping of one record type.
///
/// Computed once per type and shared; never mutated after construction.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    /// Record type name.
    pub record: &'static str,
    /// Table name.
    pub table: String,
    /// Columns in declaration order, embedded records expanded in place.
    pub columns: Vec<ColumnDescriptor>,
    primary_key: Option<usize>,
    read_by: Option<Annotation>,
    write_by: Option<Annotation>,
}

/// A `read_by`/`write_by` annotation and what it was checked against.
#[derive(Debug, Clone)]
struct Annotation {
    kind: &'static str,
    determiner: Determiner,
    /// Primary-key field of the referenced record type.
    target_primary_key: Option<&'static str>,
}

impl Annotation {
    fn new(kind: &'static str, (column, fk): (usize, ForeignKey)) -> Self {
        Self {
            kind,
            determiner: Determiner {
                column,
                record: fk.record,
                field: fk.field,
            },
            target_primary_key: primary_key_field((fk.shape)()),
        }
    }

    /// The determiner, if the annotation names the referenced primary key.
    fn checked(&self, record: &'static str) -> Result<Determiner> {
        if self.target_primary_key == Some(self.determiner.field) {
            Ok(self.determiner.clone())
        } else {
            Err(Error::InvalidAnnotation {
                record,
                annotation: self.kind,
                target: self.determiner.record,
                field: self.determiner.field,
            })
        }
    }
}

#[derive(Default)]
struct Flattened {
    columns: Vec<ColumnDescriptor>,
    primary_key: Option<usize>,
    read_by: Option<(usize, ForeignKey)>,
    write_by: Option<(usize, ForeignKey)>,
}

impl RecordSchema {
    /// Introspect a record type.
    pub fn build<R: Record>() -> Self {
        let mut flat = Flattened::default();
        flatten(R::NAME, R::shape(), &FieldPath::root(), &mut flat);

        Self {
            record: R::NAME,
            table: to_snake(R::NAME),
            columns: flat.columns,
            primary_key: flat.primary_key,
            read_by: flat.read_by.map(|fk| Annotation::new("read_by", fk)),
            write_by: flat.write_by.map(|fk| Annotation::new("write_by", fk)),
        }
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The primary-key column, if the record declares one.
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.primary_key.map(|i| &self.columns[i])
    }

    /// The column that decides read permission.
    ///
    /// The annotated foreign id if there is one, otherwise the record's own
    /// primary key. Fails with [`Error::InvalidAnnotation`] if the
    /// annotation does not name the referenced type's primary key.
    pub fn read_determiner(&self) -> Result<Option<Determiner>> {
        self.determiner(self.read_by.as_ref())
    }

    /// The column that decides write permission.
    pub fn write_determiner(&self) -> Result<Option<Determiner>> {
        self.determiner(self.write_by.as_ref())
    }

    fn determiner(&self, annotation: Option<&Annotation>) -> Result<Option<Determiner>> {
        match annotation {
            Some(annotation) => annotation.checked(self.record).map(Some),
            None => Ok(self.self_determiner()),
        }
    }

    fn self_determiner(&self) -> Option<Determiner> {
        self.primary_key.map(|column| Determiner {
            column,
            record: self.record,
            field: self.columns[column].path.leaf().unwrap_or_default(),
        })
    }

    /// The record's own id, read from its primary-key column.
    pub fn primary_key_id<R: Record>(&self, record: &R) -> Result<i64> {
        let column = self.primary_key.ok_or(Error::NoPrimaryKey {
            record: self.record,
        })?;
        self.id_at(record, column)?.ok_or(Error::MissingId {
            record: self.record,
        })
    }

    /// Read the integer id stored in `column` of `record`.
    pub fn id_at<R: Record>(&self, record: &R, column: usize) -> Result<Option<i64>> {
        let descriptor = &self.columns[column];
        match record.field_value(descriptor.path.as_slice()) {
            Some(Value::Integer(id)) => Ok(Some(id)),
            Some(Value::Null) => Ok(None),
            Some(other) => Err(Error::Decode {
                record: self.record,
                column: descriptor.name.clone(),
                source: FieldError::TypeMismatch {
                    expected: "integer",
                    found: other.kind(),
                },
            }),
            None => Err(Error::UnknownColumn {
                record: self.record,
                column: descriptor.name.clone(),
            }),
        }
    }
}

fn flatten(record: &'static str, shape: Vec<FieldShape>, prefix: &FieldPath, out: &mut Flattened) {
    for field in shape {
        match field.kind {
            FieldKind::Column {
                primary_key,
                read_by,
                write_by,
            } => {
                let index = out.columns.len();
                out.columns.push(ColumnDescriptor {
                    name: to_snake(field.name),
                    path: prefix.child(field.name),
                    is_primary_key: primary_key,
                });

                if primary_key {
                    claim(record, "primary key", &mut out.primary_key, index);
                }
                if let Some(fk) = read_by {
                    claim(record, "read_by", &mut out.read_by, (index, fk));
                }
                if let Some(fk) = write_by {
                    claim(record, "write_by", &mut out.write_by, (index, fk));
                }
            }
            FieldKind::Embedded(nested) => {
                flatten(record, nested(), &prefix.child(field.name), out);
            }
            FieldKind::Private | FieldKind::Skipped => {}
        }
    }
}

/// Leaf name of the primary-key field in a shape, searching embedded records.
fn primary_key_field(shape: Vec<FieldShape>) -> Option<&'static str> {
    shape.into_iter().find_map(|field| match field.kind {
        FieldKind::Column {
            primary_key: true, ..
        } => Some(field.name),
        FieldKind::Embedded(nested) => primary_key_field(nested()),
        _ => None,
    })
}

/// First declaration in column order wins.
fn claim<T>(record: &'static str, what: &str, slot: &mut Option<T>, value: T) {
    if slot.is_some() {
        warn!(record, annotation = what, "duplicate annotation through embedded record ignored");
    } else {
        *slot = Some(value);
    }
}

static SCHEMAS: OnceLock<DashMap<TypeId, Arc<RecordSchema>>> = OnceLock::new();

/// The cached schema of a record type.
pub fn schema<R: Record>() -> Arc<RecordSchema> {
    let cache = SCHEMAS.get_or_init(DashMap::new);
    let key = TypeId::of::<R>();

    if let Some(cached) = cache.get(&key) {
        return Arc::clone(cached.value());
    }

    // Racing first uses may both build; the first insert wins.
    let built = Arc::new(RecordSchema::build::<R>());
    let entry = cache.entry(key).or_insert(built);
    Arc::clone(entry.value())
}

/// Ordered column descriptors of a record type.
pub fn columns<R: Record>() -> Vec<ColumnDescriptor> {
    schema::<R>().columns.clone()
}

/// Table name of a record type.
pub fn table_name<R: Record>() -> String {
    to_snake(R::NAME)
}
