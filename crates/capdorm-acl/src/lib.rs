//! Username/password access-control tables.
//!
//! A small companion to the capability layer for deployments that need
//! login and per-object viewer lists: a `users` table (salted password
//! digests, admin flag) and an `objects` table (owner, public flag, allowed
//! viewers). It shares the core [`Store`](capdorm_core::Store) handle and is
//! otherwise independent of the mapping engine.

pub mod acl;
pub mod error;
mod password;

pub use acl::{Acl, ROOT_PASSWORD, ROOT_USER};
pub use error::{AclError, AclResult};
