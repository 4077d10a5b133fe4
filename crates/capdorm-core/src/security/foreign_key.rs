//! Resolution of the field that decides a record's read permission.
//!
//! A record type whose field carries `read_by(Other, id)` is readable when the
//! caller may read the `Other` identified by that field. A record type
//! without the annotation decides for itself through its primary key.

use std::collections::BTreeSet;

use super::capability::{Access, Capability};
use crate::catalog::{schema, Determiner, Record};
use crate::error::{Error, Result};

/// The column deciding read permission for `R`, and the record type it names.
pub fn read_determiner<R: Record>() -> Result<Determiner> {
    schema::<R>()
        .read_determiner()?
        .ok_or(Error::NoReadDeterminer { record: R::NAME })
}

/// Name of the field whose value decides read permission for `R`.
///
/// The annotated field if `R` has a `read_by` annotation, otherwise `R`'s
/// own primary-key field.
pub fn read_determining_id_field<R: Record>() -> Result<&'static str> {
    let determiner = read_determiner::<R>()?;
    let schema = schema::<R>();
    Ok(schema.columns[determiner.column]
        .path
        .leaf()
        .unwrap_or_default())
}

/// Ids of the determining record type that `cap` may read.
///
/// For an annotated type these are ids of the referenced type, not of `R`.
pub fn read_determining_ids<R: Record>(cap: &Capability) -> Result<BTreeSet<i64>> {
    let determiner = read_determiner::<R>()?;
    Ok(cap.ids(determiner.record, Access::Read))
}
