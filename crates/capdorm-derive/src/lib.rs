#![warn(missing_docs)]

//! Derive macro for capdorm records.
//!
//! Re-exported by the `capdorm` crate; generated code refers to items through
//! `::capdorm`, so depend on the facade rather than on this crate directly.

use proc_macro::TokenStream;
mod record;

/// Implement `capdorm::Record` for a struct with named fields.
///
/// Every `pub` field becomes a column named after the field. Non-`pub`
/// fields are never mapped. Field attributes:
///
/// - `#[record(primary_key)]`: the storage-assigned id column
/// - `#[record(embed)]`: flatten a nested `Record` into this record's columns
/// - `#[record(skip)]`: leave a `pub` field out of the mapping
/// - `#[record(read_by(Type, field))]`: read permission comes from the `Type`
///   whose `field` equals this field's value
/// - `#[record(write_by(Type, field))]`: same, for write permission
///
/// A mapped field whose type has no `FieldValue` conversion is rejected at
/// compile time.
///
/// ```rust,ignore
/// #[derive(Debug, Default, Record)]
/// pub struct UserComment {
///     #[record(primary_key)]
///     pub id: i64,
///     #[record(read_by(User, id))]
///     pub user_id: i64,
///     pub body: String,
/// }
/// ```
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive(input)
}
