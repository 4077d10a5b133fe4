//! Access-control error types.

use thiserror::Error;

/// Access-control errors.
///
/// A wrong password is not an error: [`Acl::login`](crate::Acl::login)
/// returns `Ok(false)`.
#[derive(Debug, Error)]
pub enum AclError {
    /// The acting user must be an admin.
    #[error("user `{0}` is not an admin")]
    NotAdmin(String),

    /// No user with this name.
    #[error("unknown user `{0}`")]
    UnknownUser(String),

    /// No object with this id.
    #[error("unknown object `{0}`")]
    UnknownObject(String),

    /// Viewer lists of public objects cannot be edited.
    #[error("object `{0}` is public")]
    PublicObject(String),

    /// The acting user is neither the object's owner nor an admin.
    #[error("user `{identity}` may not modify object `{object}`")]
    NotOwner {
        /// Acting user.
        identity: String,
        /// Object id.
        object: String,
    },

    /// An object's owner is always one of its viewers.
    #[error("cannot remove owner `{owner}` from object `{object}`")]
    CannotRemoveOwner {
        /// Object owner.
        owner: String,
        /// Object id.
        object: String,
    },

    /// A user with this name already exists.
    #[error("user `{0}` already exists")]
    UserExists(String),

    /// An object with this id already exists.
    #[error("object `{0}` already exists")]
    ObjectExists(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored viewer list could not be encoded or decoded.
    #[error("viewer list encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for access-control operations.
pub type AclResult<T> = std::result::Result<T, AclError>;
