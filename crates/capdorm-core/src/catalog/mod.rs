//! Record catalog: naming, record shapes, values and derived schemas.

mod naming;
mod record;
mod schema;
mod value;

pub use naming::to_snake;
pub use record::{FieldKind, FieldShape, ForeignKey, Record};
pub use schema::{
    columns, schema, table_name, ColumnDescriptor, Determiner, FieldPath, RecordSchema,
};
pub use value::{FieldError, FieldValue, Value};
