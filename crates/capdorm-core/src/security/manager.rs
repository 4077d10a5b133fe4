//! Root capabilities and capability derivation.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use super::capability::{Capability, Grant, Object};
use crate::error::Result;

/// Keeper of each user's root capability.
///
/// Roots are stored whole and replaced whole, so a reader always sees a
/// complete capability. Derivation never touches stored roots: every
/// `add_*`/`remove_*` call returns a new value.
#[derive(Debug, Default)]
pub struct CapabilityManager {
    roots: RwLock<HashMap<String, Capability>>,
}

impl CapabilityManager {
    /// Create a manager with no roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently set root capability of `username`.
    pub fn get_root(&self, username: &str) -> Option<Capability> {
        self.roots.read().get(username).cloned()
    }

    /// Install a root capability granting read on every object in
    /// `read_set` and write on every object in `write_set`, replacing any
    /// previous root for `username`.
    ///
    /// Fails without changing the stored root if an object has no id.
    #[instrument(skip(self, read_set, write_set))]
    pub fn set_root(
        &self,
        username: &str,
        read_set: &[&dyn Object],
        write_set: &[&dyn Object],
    ) -> Result<()> {
        let mut grants = Vec::with_capacity(read_set.len() + write_set.len());
        for object in read_set {
            grants.push(Grant::read(object.object_ref()?));
        }
        for object in write_set {
            grants.push(Grant::write(object.object_ref()?));
        }

        let root = Capability::from_grants(grants);
        info!(grants = root.len(), "installing root capability");
        self.roots.write().insert(username.to_string(), root);
        Ok(())
    }

    /// Remove and return the root capability of `username`.
    pub fn remove_root(&self, username: &str) -> Option<Capability> {
        self.roots.write().remove(username)
    }

    /// Usernames that currently have a root capability, sorted.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roots.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// `cap` plus read access to `object`.
    pub fn add_read<O: Object + ?Sized>(
        &self,
        cap: &Capability,
        object: &O,
    ) -> Result<Capability> {
        let grant = Grant::read(object.object_ref()?);
        debug!(?grant, "add grant");
        Ok(cap.with_grant(grant))
    }

    /// `cap` plus write access to `object`.
    pub fn add_write<O: Object + ?Sized>(
        &self,
        cap: &Capability,
        object: &O,
    ) -> Result<Capability> {
        let grant = Grant::write(object.object_ref()?);
        debug!(?grant, "add grant");
        Ok(cap.with_grant(grant))
    }

    /// `cap` without read access to `object`.
    pub fn remove_read<O: Object + ?Sized>(
        &self,
        cap: &Capability,
        object: &O,
    ) -> Result<Capability> {
        let grant = Grant::read(object.object_ref()?);
        debug!(?grant, "remove grant");
        Ok(cap.without_grant(grant))
    }

    /// `cap` without write access to `object`.
    pub fn remove_write<O: Object + ?Sized>(
        &self,
        cap: &Capability,
        object: &O,
    ) -> Result<Capability> {
        let grant = Grant::write(object.object_ref()?);
        debug!(?grant, "remove grant");
        Ok(cap.without_grant(grant))
    }
}
