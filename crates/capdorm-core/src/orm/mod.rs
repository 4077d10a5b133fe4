//! The generic mapping engine.
//!
//! [`RecordStore`] is the seam between the secure mapper and storage: it
//! fetches and inserts whole records of any [`Record`] type. [`Mapper`] is the
//! SQLite implementation.

mod mapper;

pub use mapper::Mapper;

use crate::catalog::Record;
use crate::error::Result;

/// Unfiltered record access.
pub trait RecordStore: Send + Sync {
    /// Check whether the record type's table exists.
    fn has_table<R: Record>(&self) -> Result<bool>;

    /// Every row of the record type's table, in storage order.
    fn find_all<R: Record>(&self) -> Result<Vec<R>>;

    /// The storage-defined first row, or `None` if the table is empty.
    fn find_first<R: Record>(&self) -> Result<Option<R>>;

    /// Insert a record.
    ///
    /// The primary-key column is left for storage to assign, and the assigned
    /// id is written back into `record`. Fails with
    /// [`Error::MissingTable`](crate::Error::MissingTable) if the table does
    /// not exist.
    fn create<R: Record>(&self, record: &mut R) -> Result<()>;
}
