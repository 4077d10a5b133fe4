//! Capability-based access control.
//!
//! - [`Capability`]: an immutable set of per-object read/write grants
//! - [`CapabilityManager`]: each user's root capability, and derivation
//! - [`foreign_key`]: which field decides a record's read permission
//! - [`SecureDb`]: fetch and insert filtered through a capability
//!
//! # Example
//!
//! ```ignore
//! let cm = Arc::new(CapabilityManager::new());
//! cm.set_root(&user.name, &[&user], &[&user])?;
//!
//! let db = SecureDb::new(Mapper::new(store), Arc::clone(&cm));
//! let cap = cm.get_root(&user.name).unwrap_or_default();
//! let comments: Vec<UserComment> = db.find(&cap)?;
//! ```

pub mod capability;
pub mod foreign_key;
pub mod manager;
pub mod secure;

pub use capability::{Access, Capability, Grant, Object, ObjectRef};
pub use foreign_key::{read_determiner, read_determining_id_field, read_determining_ids};
pub use manager::CapabilityManager;
pub use secure::SecureDb;
