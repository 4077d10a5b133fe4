//! Relational storage boundary.
//!
//! A [`Store`] owns one SQLite connection. The mapping engine issues only
//! three statement shapes through it: select-all, select-first and insert.

mod config;
mod store;

pub use config::StoreConfig;
pub use store::Store;
