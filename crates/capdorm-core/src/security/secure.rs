//! Capability-filtered record access.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::capability::{Access, Capability};
use super::foreign_key::{read_determiner, read_determining_ids};
use super::manager::CapabilityManager;
use crate::catalog::{schema, Record};
use crate::error::{Error, Result};
use crate::orm::{Mapper, RecordStore};

/// A record store that only shows and accepts what a capability permits.
///
/// Reads return the rows whose read-determining id is granted read access;
/// writes succeed only when the record's write-determining id is granted
/// write access. Denials are silent: filtered rows and `Ok(false)`.
pub struct SecureDb<S: RecordStore = Mapper> {
    inner: S,
    manager: Arc<CapabilityManager>,
}

impl<S: RecordStore> SecureDb<S> {
    /// Wrap `inner`, enforcing capabilities issued by `manager`.
    pub fn new(inner: S, manager: Arc<CapabilityManager>) -> Self {
        Self { inner, manager }
    }

    /// The unfiltered store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The capability manager capabilities are obtained from.
    pub fn manager(&self) -> &Arc<CapabilityManager> {
        &self.manager
    }

    /// All rows of `R` that `cap` may read, in storage order.
    #[instrument(skip(self, cap), fields(record = R::NAME))]
    pub fn find<R: Record>(&self, cap: &Capability) -> Result<Vec<R>> {
        let determiner = read_determiner::<R>()?;
        let readable = read_determining_ids::<R>(cap)?;
        let schema = schema::<R>();

        let rows = self.inner.find_all::<R>()?;
        let total = rows.len();
        let mut kept = Vec::with_capacity(total.min(readable.len()));
        for row in rows {
            if is_readable(&readable, schema.id_at(&row, determiner.column)?) {
                kept.push(row);
            }
        }

        debug!(total, kept = kept.len(), "filtered rows");
        Ok(kept)
    }

    /// The first row of `R` in storage order that `cap` may read.
    ///
    /// This is not necessarily the table's first row.
    #[instrument(skip(self, cap), fields(record = R::NAME))]
    pub fn first<R: Record>(&self, cap: &Capability) -> Result<Option<R>> {
        let determiner = read_determiner::<R>()?;
        let readable = read_determining_ids::<R>(cap)?;
        let schema = schema::<R>();

        for row in self.inner.find_all::<R>()? {
            if is_readable(&readable, schema.id_at(&row, determiner.column)?) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Check whether `cap` permits writing `record`.
    ///
    /// Decided by the `write_by` annotated field if there is one, otherwise
    /// by the record's own primary key. A record type with neither can never
    /// be written.
    pub fn can_write<R: Record>(&self, cap: &Capability, record: &R) -> Result<bool> {
        let schema = schema::<R>();
        let Some(determiner) = schema.write_determiner()? else {
            return Ok(false);
        };

        Ok(match schema.id_at(record, determiner.column)? {
            Some(id) => cap.allows(determiner.record, id, Access::Write),
            None => false,
        })
    }

    /// Insert `record` if `cap` permits writing it.
    ///
    /// Returns `Ok(false)` without touching storage when denied. A missing
    /// table is an error whether or not the write would be permitted.
    #[instrument(skip(self, cap, record), fields(record = R::NAME))]
    pub fn create<R: Record>(&self, cap: &Capability, record: &mut R) -> Result<bool> {
        if !self.inner.has_table::<R>()? {
            let schema = schema::<R>();
            return Err(Error::MissingTable {
                record: schema.record,
                table: schema.table.clone(),
            });
        }

        if !self.can_write(cap, record)? {
            debug!("write denied");
            return Ok(false);
        }

        self.inner.create(record)?;
        Ok(true)
    }
}

fn is_readable(readable: &BTreeSet<i64>, id: Option<i64>) -> bool {
    id.is_some_and(|id| readable.contains(&id))
}
