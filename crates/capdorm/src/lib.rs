//! capdorm - an object-relational mapper with capability-filtered access.
//!
//! Write a struct once, derive [`Record`], and the mapping engine derives its
//! table name and columns from it. [`SecureDb`] layers immutable per-object
//! capabilities over the engine: reads return only rows the capability may
//! read, inserts succeed only when it may write.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use capdorm::{CapabilityManager, Mapper, Record, RecordStore, SecureDb, Store};
//!
//! #[derive(Debug, Default, Record)]
//! pub struct User {
//!     #[record(primary_key)]
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! #[derive(Debug, Default, Record)]
//! pub struct UserComment {
//!     #[record(primary_key)]
//!     pub id: i64,
//!     #[record(read_by(User, id), write_by(User, id))]
//!     pub user_id: i64,
//!     pub body: String,
//! }
//!
//! # fn main() -> capdorm::Result<()> {
//! let store = Arc::new(Store::open_in_memory()?);
//! store.execute_batch(
//!     r#"CREATE TABLE "user" (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
//!        CREATE TABLE user_comment (id INTEGER PRIMARY KEY, user_id INTEGER, body TEXT);"#,
//! )?;
//!
//! let db = SecureDb::new(Mapper::new(store), Arc::new(CapabilityManager::new()));
//!
//! let mut alice = User { name: "alice".into(), ..Default::default() };
//! db.inner().create(&mut alice)?;
//! db.manager().set_root("alice", &[&alice], &[&alice])?;
//! let cap = db.manager().get_root("alice").unwrap_or_default();
//!
//! let mut comment = UserComment { user_id: alice.id, body: "hi".into(), ..Default::default() };
//! assert!(db.create(&cap, &mut comment)?);
//!
//! let visible: Vec<UserComment> = db.find(&cap)?;
//! assert_eq!(visible.len(), 1);
//! # Ok(())
//! # }
//! ```

pub use capdorm_core::*;

/// Derive macro generating [`Record`] implementations.
pub use capdorm_derive::Record;
