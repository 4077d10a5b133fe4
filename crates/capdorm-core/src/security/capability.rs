//! Immutable per-object capabilities.
//!
//! A [`Capability`] is a set of `(record type, id, access)` grants. It has no
//! mutators: deriving a capability with one grant more or less produces a new
//! value. Unchanged parts of the grant set are shared with the parent behind
//! `Arc`s, so derivation copies only the id set of the affected record type.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::catalog::{schema, Record};
use crate::error::Result;

/// Kind of access a grant permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Read the object.
    Read,
    /// Write the object.
    Write,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// Identity of a stored object: its record type and primary-key id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectRef {
    /// Record type name.
    pub record: &'static str,
    /// Primary-key id.
    pub id: i64,
}

/// A single grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Grant {
    /// Record type name.
    pub record: &'static str,
    /// Object id.
    pub id: i64,
    /// Granted access.
    pub access: Access,
}

impl Grant {
    /// Read access to `object`.
    pub fn read(object: ObjectRef) -> Self {
        Self {
            record: object.record,
            id: object.id,
            access: Access::Read,
        }
    }

    /// Write access to `object`.
    pub fn write(object: ObjectRef) -> Self {
        Self {
            record: object.record,
            id: object.id,
            access: Access::Write,
        }
    }
}

/// Anything that can be named by a capability grant.
///
/// Implemented for every [`Record`]; the id comes from the record's own
/// primary key. Usable as `&dyn Object` to mix record types in one set.
pub trait Object {
    /// The object's record type and id.
    fn object_ref(&self) -> Result<ObjectRef>;
}

impl<R: Record> Object for R {
    fn object_ref(&self) -> Result<ObjectRef> {
        let id = schema::<R>().primary_key_id(self)?;
        Ok(ObjectRef {
            record: R::NAME,
            id,
        })
    }
}

type GrantKey = (&'static str, Access);

/// An immutable set of read/write grants on individual objects.
///
/// Cloning is cheap and the clone is indistinguishable from the original.
/// Empty id sets are never stored, so equality is equality of grant sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capability {
    grants: Arc<HashMap<GrantKey, Arc<BTreeSet<i64>>>>,
}

impl Capability {
    /// A capability granting nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A capability holding exactly `grants`.
    pub fn from_grants(grants: impl IntoIterator<Item = Grant>) -> Self {
        let mut map: HashMap<GrantKey, BTreeSet<i64>> = HashMap::new();
        for grant in grants {
            map.entry((grant.record, grant.access))
                .or_default()
                .insert(grant.id);
        }
        Self {
            grants: Arc::new(map.into_iter().map(|(k, v)| (k, Arc::new(v))).collect()),
        }
    }

    /// Check for a grant.
    pub fn allows(&self, record: &'static str, id: i64, access: Access) -> bool {
        self.grants
            .get(&(record, access))
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Check read access to the `R` with the given id.
    pub fn can_read<R: Record>(&self, id: i64) -> bool {
        self.allows(R::NAME, id, Access::Read)
    }

    /// Check write access to the `R` with the given id.
    pub fn can_write<R: Record>(&self, id: i64) -> bool {
        self.allows(R::NAME, id, Access::Write)
    }

    /// Check read access to an object by its own id.
    ///
    /// An object without an id is never readable.
    pub fn can_read_object<O: Object + ?Sized>(&self, object: &O) -> bool {
        object
            .object_ref()
            .is_ok_and(|o| self.allows(o.record, o.id, Access::Read))
    }

    /// Check write access to an object by its own id.
    pub fn can_write_object<O: Object + ?Sized>(&self, object: &O) -> bool {
        object
            .object_ref()
            .is_ok_and(|o| self.allows(o.record, o.id, Access::Write))
    }

    /// Every id of `record` granted `access`.
    pub fn ids(&self, record: &'static str, access: Access) -> BTreeSet<i64> {
        self.grants
            .get(&(record, access))
            .map(|ids| ids.as_ref().clone())
            .unwrap_or_default()
    }

    /// Iterate over all grants, in no particular order.
    pub fn grants(&self) -> impl Iterator<Item = Grant> + '_ {
        self.grants.iter().flat_map(|(&(record, access), ids)| {
            ids.iter().map(move |&id| Grant { record, id, access })
        })
    }

    /// Number of grants.
    pub fn len(&self) -> usize {
        self.grants.values().map(|ids| ids.len()).sum()
    }

    /// Check if nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// A new capability with `grant` added.
    pub fn with_grant(&self, grant: Grant) -> Self {
        if self.allows(grant.record, grant.id, grant.access) {
            return self.clone();
        }

        let mut grants = self.grants.as_ref().clone();
        let ids = grants.entry((grant.record, grant.access)).or_default();
        Arc::make_mut(ids).insert(grant.id);
        Self {
            grants: Arc::new(grants),
        }
    }

    /// A new capability with `grant` absent.
    pub fn without_grant(&self, grant: Grant) -> Self {
        if !self.allows(grant.record, grant.id, grant.access) {
            return self.clone();
        }

        let key = (grant.record, grant.access);
        let mut grants = self.grants.as_ref().clone();
        if let Some(ids) = grants.get_mut(&key) {
            Arc::make_mut(ids).remove(&grant.id);
            if ids.is_empty() {
                grants.remove(&key);
            }
        }
        Self {
            grants: Arc::new(grants),
        }
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut grants: Vec<Grant> = self.grants().collect();
        grants.sort();
        grants.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(record: &'static str, id: i64) -> ObjectRef {
        ObjectRef { record, id }
    }

    #[test]
    fn test_empty_capability() {
        let cap = Capability::empty();
        assert!(cap.is_empty());
        assert_eq!(cap.len(), 0);
        assert!(!cap.allows("User", 1, Access::Read));
    }

    #[test]
    fn test_from_grants() {
        let cap = Capability::from_grants([
            Grant::read(obj("User", 1)),
            Grant::write(obj("User", 1)),
            Grant::read(obj("Post", 7)),
        ]);

        assert!(cap.allows("User", 1, Access::Read));
        assert!(cap.allows("User", 1, Access::Write));
        assert!(cap.allows("Post", 7, Access::Read));
        assert!(!cap.allows("Post", 7, Access::Write));
        assert!(!cap.allows("User", 2, Access::Read));
        assert_eq!(cap.len(), 3);
    }

    #[test]
    fn test_with_grant_leaves_parent_unchanged() {
        let parent = Capability::from_grants([Grant::read(obj("User", 1))]);
        let child = parent.with_grant(Grant::read(obj("User", 2)));

        assert!(child.allows("User", 2, Access::Read));
        assert!(!parent.allows("User", 2, Access::Read));
        assert!(child.allows("User", 1, Access::Read));
        assert_eq!(parent.len(), 1);
    }

    #[test]
    fn test_without_grant_leaves_parent_unchanged() {
        let parent = Capability::from_grants([
            Grant::read(obj("User", 1)),
            Grant::read(obj("User", 2)),
        ]);
        let child = parent.without_grant(Grant::read(obj("User", 1)));

        assert!(!child.allows("User", 1, Access::Read));
        assert!(parent.allows("User", 1, Access::Read));
        assert!(child.allows("User", 2, Access::Read));
    }

    #[test]
    fn test_add_then_remove_is_identity() {
        let base = Capability::from_grants([Grant::write(obj("Post", 3))]);
        let round_trip = base
            .with_grant(Grant::read(obj("Post", 3)))
            .without_grant(Grant::read(obj("Post", 3)));
        assert_eq!(round_trip, base);

        let emptied = Capability::empty()
            .with_grant(Grant::read(obj("Post", 3)))
            .without_grant(Grant::read(obj("Post", 3)));
        assert_eq!(emptied, Capability::empty());
        assert!(emptied.is_empty());
    }

    #[test]
    fn test_remove_absent_grant_is_noop() {
        let base = Capability::from_grants([Grant::read(obj("User", 1))]);
        let same = base.without_grant(Grant::write(obj("User", 1)));
        assert_eq!(same, base);
    }

    #[test]
    fn test_untouched_record_sets_are_shared() {
        let parent = Capability::from_grants([
            Grant::read(obj("User", 1)),
            Grant::read(obj("Post", 1)),
        ]);
        let child = parent.with_grant(Grant::read(obj("Post", 2)));

        let users = |c: &Capability| Arc::clone(&c.grants[&("User", Access::Read)]);
        assert!(Arc::ptr_eq(&users(&parent), &users(&child)));
    }

    #[test]
    fn test_ids() {
        let cap = Capability::from_grants([
            Grant::read(obj("User", 3)),
            Grant::read(obj("User", 1)),
            Grant::write(obj("User", 2)),
        ]);
        assert_eq!(
            cap.ids("User", Access::Read).into_iter().collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(cap.ids("Post", Access::Read).is_empty());
    }

    #[test]
    fn test_serialize_sorted() {
        let cap = Capability::from_grants([
            Grant::write(obj("User", 2)),
            Grant::read(obj("User", 1)),
        ]);
        let json = serde_json::to_value(&cap).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "record": "User", "id": 1, "access": "read" },
                { "record": "User", "id": 2, "access": "write" },
            ])
        );
    }
}
