//! capdorm core - mapping engine, schema introspection and capability checks.
//!
//! Record types describe themselves through [`Record`] (normally derived);
//! the [`catalog`] turns that description into a cached [`RecordSchema`], the
//! [`orm`] maps rows to records through it, and [`security`] filters that
//! access through immutable capabilities.

pub mod catalog;
pub mod error;
pub mod orm;
pub mod security;
pub mod storage;

pub use catalog::{
    columns, schema, table_name, to_snake, ColumnDescriptor, Determiner, FieldError, FieldKind,
    FieldPath, FieldShape, FieldValue, ForeignKey, Record, RecordSchema, Value,
};
pub use error::{Error, Result};
pub use orm::{Mapper, RecordStore};
pub use storage::{Store, StoreConfig};

// Security exports
pub use security::{
    read_determiner, read_determining_id_field, read_determining_ids, Access, Capability,
    CapabilityManager, Grant, Object, ObjectRef, SecureDb,
};
