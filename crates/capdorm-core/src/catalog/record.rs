//! The record trait and the declared shape of record types.

use super::value::{FieldError, Value};

/// A typed record mapped to exactly one table.
///
/// Implementations are normally generated by `#[derive(Record)]`. The shape
/// lists fields in declaration order; embedded records contribute their own
/// shape, which the schema introspector flattens into the parent's columns.
pub trait Record: Default + Send + Sync + 'static {
    /// Record type name. The table name is derived from it, and capability
    /// grants are keyed by it.
    const NAME: &'static str;

    /// Declared fields, in declaration order.
    fn shape() -> Vec<FieldShape>;

    /// Read the value of the column at `path`.
    ///
    /// Returns `None` if the path does not name a column of this record.
    fn field_value(&self, path: &[&'static str]) -> Option<Value>;

    /// Overwrite the column at `path` with a decoded value.
    fn set_field_value(&mut self, path: &[&'static str], value: Value) -> Result<(), FieldError>;
}

/// A declared field of a record type.
#[derive(Debug, Clone)]
pub struct FieldShape {
    /// Field name as written in the record type.
    pub name: &'static str,
    /// How the field is mapped.
    pub kind: FieldKind,
}

/// How a declared field participates in the mapping.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A stored scalar value.
    Column {
        /// The storage-assigned primary key.
        primary_key: bool,
        /// Read permission is inherited from another record type.
        read_by: Option<ForeignKey>,
        /// Write permission is inherited from another record type.
        write_by: Option<ForeignKey>,
    },
    /// A nested record flattened into the parent's columns.
    Embedded(fn() -> Vec<FieldShape>),
    /// A non-public field, never exposed as a column.
    Private,
    /// A public field explicitly excluded from the mapping.
    Skipped,
}

/// Reference to the id field of another record type.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    /// Name of the referenced record type.
    pub record: &'static str,
    /// Id field of the referenced record type. Must be its primary key.
    pub field: &'static str,
    /// Shape of the referenced record type.
    pub shape: fn() -> Vec<FieldShape>,
}

impl FieldShape {
    /// A plain scalar column.
    pub fn column(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Column {
                primary_key: false,
                read_by: None,
                write_by: None,
            },
        }
    }

    /// The primary-key column.
    pub fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Column {
                primary_key: true,
                read_by: None,
                write_by: None,
            },
        }
    }

    /// An embedded record.
    pub fn embedded<R: Record>(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Embedded(R::shape),
        }
    }

    /// A non-public field.
    pub fn private(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Private,
        }
    }

    /// A field excluded from the mapping.
    pub fn skipped(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Skipped,
        }
    }

    /// Declare that read permission comes from `R`'s `field`.
    pub fn read_by<R: Record>(mut self, field: &'static str) -> Self {
        if let FieldKind::Column { read_by, .. } = &mut self.kind {
            *read_by = Some(ForeignKey {
                record: R::NAME,
                field,
                shape: R::shape,
            });
        }
        self
    }

    /// Declare that write permission comes from `R`'s `field`.
    pub fn write_by<R: Record>(mut self, field: &'static str) -> Self {
        if let FieldKind::Column { write_by, .. } = &mut self.kind {
            *write_by = Some(ForeignKey {
                record: R::NAME,
                field,
                shape: R::shape,
            });
        }
        self
    }
}
