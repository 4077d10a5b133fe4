//! The `users` and `objects` tables and their access rules.

use std::sync::Arc;

use capdorm_core::Store;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::error::{AclError, AclResult};
use crate::password;

/// Name of the admin account created by [`Acl::setup`].
pub const ROOT_USER: &str = "root";

/// Initial password of [`ROOT_USER`].
pub const ROOT_PASSWORD: &str = "root";

const CREATE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        username TEXT NOT NULL PRIMARY KEY,
        password TEXT NOT NULL,
        is_admin INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS objects (
        uuid TEXT NOT NULL PRIMARY KEY,
        owner TEXT NOT NULL,
        allowed_viewers TEXT NOT NULL,
        is_public INTEGER NOT NULL
    );
"#;

/// A stored `objects` row.
struct ObjectRow {
    owner: String,
    viewers: Vec<String>,
    is_public: bool,
}

/// Access-control lists over a shared store.
///
/// Every operation runs under the store's connection lock, so a
/// read-modify-write of a viewer list is never interleaved with another.
#[derive(Clone)]
pub struct Acl {
    store: Arc<Store>,
}

impl Acl {
    /// Wrap a store. Call [`setup`](Self::setup) once per database.
    pub fn open(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Create the tables and the `root` admin account.
    ///
    /// Safe to call again; existing tables and an existing `root` are kept.
    #[instrument(skip(self))]
    pub fn setup(&self) -> AclResult<()> {
        self.store.with_connection(|conn| {
            conn.execute_batch(CREATE_TABLES)?;
            let seeded = conn.execute(
                "INSERT OR IGNORE INTO users (username, password, is_admin) VALUES (?1, ?2, 1)",
                params![ROOT_USER, password::hash(ROOT_PASSWORD)],
            )?;
            if seeded > 0 {
                info!(user = ROOT_USER, "seeded admin account");
            }
            Ok(())
        })
    }

    /// Add a user. Only admins may create users.
    #[instrument(skip(self, new_password))]
    pub fn create_user(
        &self,
        identity: &str,
        username: &str,
        new_password: &str,
        is_admin: bool,
    ) -> AclResult<()> {
        self.store.with_connection(|conn| {
            require_admin(conn, identity)?;
            if user_exists(conn, username)? {
                return Err(AclError::UserExists(username.to_string()));
            }
            conn.execute(
                "INSERT INTO users (username, password, is_admin) VALUES (?1, ?2, ?3)",
                params![username, password::hash(new_password), is_admin],
            )?;
            info!(is_admin, "user created");
            Ok(())
        })
    }

    /// Check a password.
    ///
    /// Returns `Ok(false)` for a wrong password and
    /// [`AclError::UnknownUser`] for an unknown username.
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> AclResult<bool> {
        let stored: Option<String> = self.store.with_connection(|conn| {
            conn.query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
        })?;

        let stored = stored.ok_or_else(|| AclError::UnknownUser(username.to_string()))?;
        let ok = password::verify(password, &stored);
        debug!(ok, "login attempt");
        Ok(ok)
    }

    /// Change a password. Users may change their own; admins may change any.
    #[instrument(skip(self, new_password))]
    pub fn change_password(
        &self,
        identity: &str,
        username: &str,
        new_password: &str,
    ) -> AclResult<()> {
        self.store.with_connection(|conn| {
            let acting_admin = is_admin(conn, identity)?;
            if !user_exists(conn, username)? {
                return Err(AclError::UnknownUser(username.to_string()));
            }
            if identity != username && !acting_admin {
                return Err(AclError::NotAdmin(identity.to_string()));
            }
            conn.execute(
                "UPDATE users SET password = ?1 WHERE username = ?2",
                params![password::hash(new_password), username],
            )?;
            Ok(())
        })
    }

    /// Create a private object owned by `identity`.
    ///
    /// The owner is always a viewer, whether or not `viewers` names them.
    #[instrument(skip(self, viewers))]
    pub fn create_object_private(
        &self,
        identity: &str,
        uuid: &str,
        viewers: &[&str],
    ) -> AclResult<()> {
        let mut allowed = vec![identity.to_string()];
        for viewer in viewers {
            if !allowed.iter().any(|v| v == viewer) {
                allowed.push(viewer.to_string());
            }
        }
        self.insert_object(identity, uuid, allowed, false)
    }

    /// Create a public object owned by `identity`.
    #[instrument(skip(self))]
    pub fn create_object_public(&self, identity: &str, uuid: &str) -> AclResult<()> {
        self.insert_object(identity, uuid, Vec::new(), true)
    }

    fn insert_object(
        &self,
        identity: &str,
        uuid: &str,
        viewers: Vec<String>,
        is_public: bool,
    ) -> AclResult<()> {
        let encoded = serde_json::to_string(&viewers)?;
        self.store.with_connection(|conn| {
            if !user_exists(conn, identity)? {
                return Err(AclError::UnknownUser(identity.to_string()));
            }
            if load_object(conn, uuid)?.is_some() {
                return Err(AclError::ObjectExists(uuid.to_string()));
            }
            conn.execute(
                "INSERT INTO objects (uuid, owner, allowed_viewers, is_public)
                 VALUES (?1, ?2, ?3, ?4)",
                params![uuid, identity, encoded, is_public],
            )?;
            debug!(viewers = viewers.len(), is_public, "object created");
            Ok(())
        })
    }

    /// Add `user` to the viewers of a private object.
    ///
    /// Only the owner or an admin may do this. Adding an existing viewer
    /// changes nothing.
    #[instrument(skip(self))]
    pub fn allow_user_on_obj(&self, identity: &str, uuid: &str, user: &str) -> AclResult<()> {
        self.store.with_connection(|conn| {
            let mut object = load_private_for_update(conn, identity, uuid)?;
            if object.viewers.iter().any(|v| v == user) {
                return Ok(());
            }
            object.viewers.push(user.to_string());
            store_viewers(conn, uuid, &object.viewers)
        })
    }

    /// Remove `user` from the viewers of a private object.
    ///
    /// Only the owner or an admin may do this. Removing a non-viewer changes
    /// nothing; removing the owner is an error.
    #[instrument(skip(self))]
    pub fn disallow_user_on_obj(&self, identity: &str, uuid: &str, user: &str) -> AclResult<()> {
        self.store.with_connection(|conn| {
            let mut object = load_private_for_update(conn, identity, uuid)?;
            if object.owner == user {
                return Err(AclError::CannotRemoveOwner {
                    owner: object.owner,
                    object: uuid.to_string(),
                });
            }
            let before = object.viewers.len();
            object.viewers.retain(|v| v != user);
            if object.viewers.len() == before {
                return Ok(());
            }
            store_viewers(conn, uuid, &object.viewers)
        })
    }

    /// Delete an object. Only the owner or an admin may do this.
    #[instrument(skip(self))]
    pub fn delete_object(&self, identity: &str, uuid: &str) -> AclResult<()> {
        self.store.with_connection(|conn| {
            let admin = is_admin(conn, identity)?;
            let object = load_object(conn, uuid)?
                .ok_or_else(|| AclError::UnknownObject(uuid.to_string()))?;
            require_owner_or_admin(identity, admin, uuid, &object)?;
            conn.execute("DELETE FROM objects WHERE uuid = ?1", params![uuid])?;
            info!("object deleted");
            Ok(())
        })
    }

    /// Check whether `identity` may view an object.
    ///
    /// Admins may view everything; anyone may view a public object; otherwise
    /// `identity` must be on the object's viewer list.
    #[instrument(skip(self))]
    pub fn check(&self, identity: &str, uuid: &str) -> AclResult<bool> {
        self.store.with_connection(|conn| {
            let object = load_object(conn, uuid)?
                .ok_or_else(|| AclError::UnknownObject(uuid.to_string()))?;
            if is_admin(conn, identity)? || object.is_public {
                return Ok(true);
            }
            Ok(object.viewers.iter().any(|v| v == identity))
        })
    }

    /// Current viewer list of an object, owner first. Empty for public
    /// objects.
    pub fn viewers(&self, uuid: &str) -> AclResult<Vec<String>> {
        self.store.with_connection(|conn| {
            load_object(conn, uuid)?
                .map(|object| object.viewers)
                .ok_or_else(|| AclError::UnknownObject(uuid.to_string()))
        })
    }
}

fn user_exists(conn: &Connection, username: &str) -> AclResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            params![username],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Admin flag of a known user.
fn is_admin(conn: &Connection, username: &str) -> AclResult<bool> {
    conn.query_row(
        "SELECT is_admin FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| AclError::UnknownUser(username.to_string()))
}

fn require_admin(conn: &Connection, identity: &str) -> AclResult<()> {
    if is_admin(conn, identity)? {
        Ok(())
    } else {
        Err(AclError::NotAdmin(identity.to_string()))
    }
}

fn require_owner_or_admin(
    identity: &str,
    admin: bool,
    uuid: &str,
    object: &ObjectRow,
) -> AclResult<()> {
    if admin || object.owner == identity {
        Ok(())
    } else {
        Err(AclError::NotOwner {
            identity: identity.to_string(),
            object: uuid.to_string(),
        })
    }
}

fn load_object(conn: &Connection, uuid: &str) -> AclResult<Option<ObjectRow>> {
    let row = conn
        .query_row(
            "SELECT owner, allowed_viewers, is_public FROM objects WHERE uuid = ?1",
            params![uuid],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((owner, viewers, is_public)) => Ok(Some(ObjectRow {
            owner,
            viewers: serde_json::from_str(&viewers)?,
            is_public,
        })),
        None => Ok(None),
    }
}

/// Load a private object whose viewer list `identity` may edit.
fn load_private_for_update(conn: &Connection, identity: &str, uuid: &str) -> AclResult<ObjectRow> {
    let admin = is_admin(conn, identity)?;
    let object = load_object(conn, uuid)?.ok_or_else(|| AclError::UnknownObject(uuid.to_string()))?;
    if object.is_public {
        return Err(AclError::PublicObject(uuid.to_string()));
    }
    require_owner_or_admin(identity, admin, uuid, &object)?;
    Ok(object)
}

fn store_viewers(conn: &Connection, uuid: &str, viewers: &[String]) -> AclResult<()> {
    conn.execute(
        "UPDATE objects SET allowed_viewers = ?1 WHERE uuid = ?2",
        params![serde_json::to_string(viewers)?, uuid],
    )?;
    debug!(viewers = viewers.len(), "viewer list updated");
    Ok(())
}
