//! Generic fetch and insert driven by record schemas.

use std::sync::Arc;

use rusqlite::Row;
use tracing::{debug, instrument};

use super::RecordStore;
use crate::catalog::{schema, to_snake, FieldError, Record, RecordSchema, Value};
use crate::error::{Error, Result};
use crate::storage::Store;

/// The mapping engine: translates records to and from table rows.
///
/// Every statement is derived from the record's column descriptors; table
/// and column identifiers come only from the naming converter, and values
/// are always bound as parameters.
#[derive(Clone)]
pub struct Mapper {
    store: Arc<Store>,
}

impl Mapper {
    /// Create a mapper over a shared store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Table name for a record type.
    pub fn table_name<R: Record>() -> String {
        to_snake(R::NAME)
    }

    fn select_sql(schema: &RecordSchema) -> String {
        let columns = if schema.columns.is_empty() {
            "1".to_string()
        } else {
            schema
                .columns
                .iter()
                .map(|c| quote(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("SELECT {} FROM {}", columns, quote(&schema.table))
    }
}

impl RecordStore for Mapper {
    fn has_table<R: Record>(&self) -> Result<bool> {
        self.store.table_exists(&schema::<R>().table)
    }

    #[instrument(skip(self), fields(record = R::NAME))]
    fn find_all<R: Record>(&self) -> Result<Vec<R>> {
        let schema = schema::<R>();
        let sql = Self::select_sql(&schema);
        debug!(%sql, "select all");

        self.store.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(decode_row::<R>(&schema, row)?);
            }
            Ok(records)
        })
    }

    #[instrument(skip(self), fields(record = R::NAME))]
    fn find_first<R: Record>(&self) -> Result<Option<R>> {
        let schema = schema::<R>();
        let sql = format!("{} LIMIT 1", Self::select_sql(&schema));
        debug!(%sql, "select first");

        self.store.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => decode_row::<R>(&schema, row).map(Some),
                None => Ok(None),
            }
        })
    }

    #[instrument(skip(self, record), fields(record = R::NAME))]
    fn create<R: Record>(&self, record: &mut R) -> Result<()> {
        let schema = schema::<R>();
        if !self.store.table_exists(&schema.table)? {
            return Err(Error::MissingTable {
                record: schema.record,
                table: schema.table.clone(),
            });
        }

        let mut names = Vec::with_capacity(schema.columns.len());
        let mut values = Vec::with_capacity(schema.columns.len());
        for column in schema.columns.iter().filter(|c| !c.is_primary_key) {
            let value = record
                .field_value(column.path.as_slice())
                .ok_or_else(|| Error::UnknownColumn {
                    record: schema.record,
                    column: column.name.clone(),
                })?;
            names.push(quote(&column.name));
            values.push(value);
        }

        let sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(&schema.table))
        } else {
            let placeholders = (1..=names.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&schema.table),
                names.join(", "),
                placeholders
            )
        };
        debug!(%sql, "insert");

        // The row is kept only once the key has been written back.
        self.store.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
            if let Some(pk) = schema.primary_key() {
                let id = tx.last_insert_rowid();
                record
                    .set_field_value(pk.path.as_slice(), Value::Integer(id))
                    .map_err(|source| field_error(&schema, &pk.name, source))?;
                debug!(id, "assigned primary key");
            }
            tx.commit()?;
            Ok(())
        })
    }
}

fn decode_row<R: Record>(schema: &RecordSchema, row: &Row<'_>) -> Result<R> {
    let mut record = R::default();
    for (i, column) in schema.columns.iter().enumerate() {
        let value: Value = row.get(i)?;
        record
            .set_field_value(column.path.as_slice(), value)
            .map_err(|source| field_error(schema, &column.name, source))?;
    }
    Ok(record)
}

fn field_error(schema: &RecordSchema, column: &str, source: FieldError) -> Error {
    match source {
        FieldError::UnknownField => Error::UnknownColumn {
            record: schema.record,
            column: column.to_string(),
        },
        source => Error::Decode {
            record: schema.record,
            column: column.to_string(),
            source,
        },
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldShape, FieldValue};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Audit {
        created_by: String,
        revision: i32,
    }

    impl Record for Audit {
        const NAME: &'static str = "Audit";

        fn shape() -> Vec<FieldShape> {
            vec![FieldShape::column("created_by"), FieldShape::column("revision")]
        }

        fn field_value(&self, path: &[&'static str]) -> Option<Value> {
            match path {
                ["created_by"] => Some(self.created_by.to_value()),
                ["revision"] => Some(self.revision.to_value()),
                _ => None,
            }
        }

        fn set_field_value(
            &mut self,
            path: &[&'static str],
            value: Value,
        ) -> std::result::Result<(), FieldError> {
            match path {
                ["created_by"] => self.created_by = FieldValue::from_value(value)?,
                ["revision"] => self.revision = FieldValue::from_value(value)?,
                _ => return Err(FieldError::UnknownField),
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct OrderLine {
        id: i64,
        audit: Audit,
        sku: String,
        quantity: Option<i64>,
    }

    impl Record for OrderLine {
        const NAME: &'static str = "OrderLine";

        fn shape() -> Vec<FieldShape> {
            vec![
                FieldShape::primary_key("id"),
                FieldShape::embedded::<Audit>("audit"),
                FieldShape::column("sku"),
                FieldShape::column("quantity"),
            ]
        }

        fn field_value(&self, path: &[&'static str]) -> Option<Value> {
            match path {
                ["id"] => Some(self.id.to_value()),
                ["audit", rest @ ..] => self.audit.field_value(rest),
                ["sku"] => Some(self.sku.to_value()),
                ["quantity"] => Some(self.quantity.to_value()),
                _ => None,
            }
        }

        fn set_field_value(
            &mut self,
            path: &[&'static str],
            value: Value,
        ) -> std::result::Result<(), FieldError> {
            match path {
                ["id"] => self.id = FieldValue::from_value(value)?,
                ["audit", rest @ ..] => self.audit.set_field_value(rest, value)?,
                ["sku"] => self.sku = FieldValue::from_value(value)?,
                ["quantity"] => self.quantity = FieldValue::from_value(value)?,
                _ => return Err(FieldError::UnknownField),
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Tag {
        label: String,
    }

    impl Record for Tag {
        const NAME: &'static str = "Tag";

        fn shape() -> Vec<FieldShape> {
            vec![FieldShape::column("label")]
        }

        fn field_value(&self, path: &[&'static str]) -> Option<Value> {
            match path {
                ["label"] => Some(self.label.to_value()),
                _ => None,
            }
        }

        fn set_field_value(
            &mut self,
            path: &[&'static str],
            value: Value,
        ) -> std::result::Result<(), FieldError> {
            match path {
                ["label"] => self.label = FieldValue::from_value(value)?,
                _ => return Err(FieldError::UnknownField),
            }
            Ok(())
        }
    }

    /// A record whose key type is narrower than the rowid.
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Slot {
        id: i8,
        label: String,
    }

    impl Record for Slot {
        const NAME: &'static str = "Slot";

        fn shape() -> Vec<FieldShape> {
            vec![FieldShape::primary_key("id"), FieldShape::column("label")]
        }

        fn field_value(&self, path: &[&'static str]) -> Option<Value> {
            match path {
                ["id"] => Some(self.id.to_value()),
                ["label"] => Some(self.label.to_value()),
                _ => None,
            }
        }

        fn set_field_value(
            &mut self,
            path: &[&'static str],
            value: Value,
        ) -> std::result::Result<(), FieldError> {
            match path {
                ["id"] => self.id = FieldValue::from_value(value)?,
                ["label"] => self.label = FieldValue::from_value(value)?,
                _ => return Err(FieldError::UnknownField),
            }
            Ok(())
        }
    }

    fn mapper() -> Mapper {
        let store = Store::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE order_line (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    created_by TEXT NOT NULL,
                    revision INTEGER NOT NULL,
                    sku TEXT NOT NULL,
                    quantity INTEGER
                );
                CREATE TABLE tag (label TEXT NOT NULL);
                CREATE TABLE slot (id INTEGER PRIMARY KEY, label TEXT NOT NULL);",
            )
            .unwrap();
        Mapper::new(Arc::new(store))
    }

    fn line(sku: &str) -> OrderLine {
        OrderLine {
            id: 0,
            audit: Audit {
                created_by: "alice".into(),
                revision: 1,
            },
            sku: sku.into(),
            quantity: Some(3),
        }
    }

    #[test]
    fn test_table_name() {
        assert_eq!(Mapper::table_name::<OrderLine>(), "order_line");
    }

    #[test]
    fn test_create_assigns_primary_key() {
        let mapper = mapper();
        let mut first = line("A-1");
        let mut second = line("B-2");

        mapper.create(&mut first).unwrap();
        mapper.create(&mut second).unwrap();

        assert_ne!(first.id, 0);
        assert_ne!(first.id, second.id);

        let found = mapper.find_first::<OrderLine>().unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(found, first);
    }

    #[test]
    fn test_find_all_preserves_storage_order() {
        let mapper = mapper();
        for sku in ["A", "B", "C"] {
            mapper.create(&mut line(sku)).unwrap();
        }

        let all = mapper.find_all::<OrderLine>().unwrap();
        let skus: Vec<_> = all.iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "B", "C"]);
        assert_eq!(all[0].audit.created_by, "alice");
    }

    #[test]
    fn test_find_first_on_empty_table() {
        let mapper = mapper();
        assert!(mapper.find_first::<OrderLine>().unwrap().is_none());
        assert!(mapper.find_all::<OrderLine>().unwrap().is_empty());
    }

    #[test]
    fn test_null_column_decodes_to_none() {
        let mapper = mapper();
        let mut record = line("N");
        record.quantity = None;
        mapper.create(&mut record).unwrap();

        let found = mapper.find_first::<OrderLine>().unwrap().unwrap();
        assert_eq!(found.quantity, None);
    }

    #[test]
    fn test_create_without_primary_key() {
        let mapper = mapper();
        mapper.create(&mut Tag { label: "red".into() }).unwrap();
        mapper.create(&mut Tag { label: "blue".into() }).unwrap();

        let labels: Vec<_> = mapper
            .find_all::<Tag>()
            .unwrap()
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["red", "blue"]);
    }

    #[test]
    fn test_create_requires_table() {
        let mapper = Mapper::new(Arc::new(Store::open_in_memory().unwrap()));
        let err = mapper.create(&mut line("X")).unwrap_err();
        assert!(matches!(err, Error::MissingTable { table, .. } if table == "order_line"));
    }

    #[test]
    fn test_find_all_on_missing_table_propagates() {
        let mapper = Mapper::new(Arc::new(Store::open_in_memory().unwrap()));
        assert!(matches!(
            mapper.find_all::<OrderLine>(),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_decode_failure() {
        let mapper = mapper();
        mapper
            .store()
            .execute_batch(
                "INSERT INTO order_line (created_by, revision, sku, quantity)
                 VALUES ('bob', 'not a number', 'Z', NULL)",
            )
            .unwrap();

        let err = mapper.find_first::<OrderLine>().unwrap_err();
        assert!(matches!(err, Error::Decode { column, .. } if column == "revision"));
    }

    #[test]
    fn test_invalid_utf8_text_is_an_error() {
        let mapper = mapper();
        mapper
            .store()
            .execute_batch("INSERT INTO tag (label) VALUES (CAST(X'66FF6F' AS TEXT))")
            .unwrap();

        assert!(matches!(mapper.find_all::<Tag>(), Err(Error::Storage(_))));
        assert!(matches!(mapper.find_first::<Tag>(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_create_rolls_back_when_key_does_not_fit() {
        let mapper = mapper();
        mapper
            .store()
            .execute_batch("INSERT INTO slot (id, label) VALUES (500, 'taken')")
            .unwrap();

        let mut slot = Slot {
            id: 0,
            label: "new".into(),
        };
        let err = mapper.create(&mut slot).unwrap_err();
        assert!(matches!(err, Error::Decode { column, .. } if column == "id"));
        assert_eq!(slot.id, 0);

        let count: i64 = mapper
            .store()
            .with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM slot", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 1);
    }
}
