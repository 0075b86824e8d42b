//! Role Registry
//!
//! Roles are few and rarely change, so they live in a single map behind one
//! `RwLock`. Role records are shared (`Arc`) between the registry and every user
//! that was granted the role.
//!
//! Deleting a role removes it from the registry and sets its tombstone. Users
//! holding the same `Arc` see the tombstone the next time their roles are read
//! and drop the reference then.

use crate::status::Status;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A named role. Shared by reference once granted to users.
#[derive(Debug)]
pub struct Role {
    name: String,
    deleted: AtomicBool,
}

impl Role {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            deleted: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the role has been deleted from the registry.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    fn tombstone(&self) {
        self.deleted.store(true, Ordering::Release);
    }
}

/// Drops tombstoned roles from a user's role list, keeping insertion order.
///
/// Returns true if anything was removed.
pub fn purge_deleted(roles: &mut Vec<Arc<Role>>) -> bool {
    let before = roles.len();
    roles.retain(|role| !role.is_deleted());
    roles.len() != before
}

/// The global role table.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: RwLock<HashMap<String, Arc<Role>>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new role.
    pub fn create(&self, name: &str) -> Status {
        let mut roles = self.roles.write().unwrap_or_else(PoisonError::into_inner);

        if roles.contains_key(name) {
            return Status::RoleAlreadyExisting;
        }
        roles.insert(name.to_string(), Arc::new(Role::new(name)));
        Status::RoleCreated
    }

    /// Tombstones a role and removes it from the registry.
    pub fn delete(&self, name: &str) -> Status {
        let mut roles = self.roles.write().unwrap_or_else(PoisonError::into_inner);

        match roles.remove(name) {
            Some(role) => {
                role.tombstone();
                debug!(role = name, "Role tombstoned");
                Status::RoleDeleted
            }
            None => Status::RoleNotFound,
        }
    }

    /// Looks up a live role by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<Role>> {
        let roles = self.roles.read().unwrap_or_else(PoisonError::into_inner);
        roles.get(name).cloned()
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.roles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
