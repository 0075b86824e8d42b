//! User Partition Store
//!
//! Users are sharded by username across independently locked maps. A user record
//! holds the id of its current token (if any) and the roles it was granted, in
//! the order they were granted.
//!
//! ## Lock Ordering
//!
//! ```text
//!   user shard ──> token shard        (authenticate, delete)
//!   user shard ──> role registry      (add role, shared read only)
//! ```
//!
//! A user shard lock is always the outer one. Nothing here takes a user shard
//! lock while holding a token shard lock.

use crate::status::Status;
use crate::storage::partition::ShardSet;
use crate::storage::role::{purge_deleted, Role, RoleRegistry};
use crate::storage::token::TokenStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A registered user.
#[derive(Debug)]
pub struct User {
    name: String,
    password: String,
    token: Option<String>,
    roles: Vec<Arc<Role>>,
}

impl User {
    pub(crate) fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            password: password.to_string(),
            token: None,
            roles: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The encoded password, compared as an opaque string.
    #[inline]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Id of the token most recently issued to this user.
    #[inline]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Granted roles, possibly including tombstoned ones not yet purged.
    pub fn roles(&self) -> &[Arc<Role>] {
        &self.roles
    }

    fn has_live_role(&self, name: &str) -> bool {
        self.roles
            .iter()
            .any(|role| role.name() == name && !role.is_deleted())
    }

    fn has_deleted_roles(&self) -> bool {
        self.roles.iter().any(|role| role.is_deleted())
    }

    fn check_password(&self, password: &str) -> Result<(), Status> {
        if self.password != password {
            return Err(Status::UserPasswordNotMatch);
        }
        Ok(())
    }
}

/// Sharded user storage.
#[derive(Debug)]
pub struct UserStore {
    shards: ShardSet<User>,
    count: AtomicU64,
}

impl UserStore {
    pub fn new(shard_count: usize) -> Self {
        Self {
            shards: ShardSet::new(shard_count),
            count: AtomicU64::new(0),
        }
    }

    /// Registers a user with no token and no roles.
    pub fn create(&self, name: &str, password: &str) -> Status {
        let mut shard = self.shards.write(name);

        if shard.contains_key(name) {
            return Status::UserAlreadyExisting;
        }
        shard.insert(name.to_string(), User::new(name, password));
        self.count.fetch_add(1, Ordering::Relaxed);
        Status::UserCreated
    }

    /// Removes a user after checking its password, severing its token first.
    pub fn delete(&self, name: &str, password: &str, tokens: &TokenStore) -> Status {
        let mut shard = self.shards.write(name);

        let Some(user) = shard.get_mut(name) else {
            return Status::UserNotFound;
        };
        if let Err(status) = user.check_password(password) {
            return status;
        }
        if let Some(id) = user.token.take() {
            if tokens.sever(&id) {
                debug!(user = name, "Token severed from deleted user");
            }
        }
        shard.remove(name);
        self.count.fetch_sub(1, Ordering::Relaxed);
        Status::UserDeleted
    }

    /// Grants a registered role to a user.
    pub fn add_role(&self, name: &str, role: &str, registry: &RoleRegistry) -> Status {
        let mut shard = self.shards.write(name);

        let Some(user) = shard.get_mut(name) else {
            return Status::UserNotFound;
        };
        purge_deleted(&mut user.roles);
        if user.has_live_role(role) {
            return Status::UserRoleAlreadyExisting;
        }
        match registry.resolve(role) {
            Some(record) => {
                user.roles.push(record);
                Status::UserRoleAdded
            }
            None => Status::RoleNotFound,
        }
    }

    /// Runs `f` on a user under an exclusive shard lock once its password checks out.
    pub fn with_verified<R>(
        &self,
        name: &str,
        password: &str,
        f: impl FnOnce(&mut User) -> R,
    ) -> Result<R, Status> {
        let mut shard = self.shards.write(name);

        let user = shard.get_mut(name).ok_or(Status::UserNotFound)?;
        user.check_password(password)?;
        Ok(f(user))
    }

    /// Runs `f` on the live roles of the user holding `token`.
    ///
    /// Tombstoned roles are purged first. The shared lock is enough when there is
    /// nothing to purge; otherwise the shard is re-locked exclusively. Fails with
    /// `TokenIsInvalid` if the user is gone or no longer holds `token`.
    pub fn with_live_roles<R>(
        &self,
        name: &str,
        token: &str,
        f: impl FnOnce(&[Arc<Role>]) -> R,
    ) -> Result<R, Status> {
        {
            let shard = self.shards.read(name);
            let user = Self::token_holder(shard.get(name), token)?;
            if !user.has_deleted_roles() {
                return Ok(f(user.roles.as_slice()));
            }
        }

        let mut shard = self.shards.write(name);
        let user = match shard.get_mut(name) {
            Some(user) if user.token() == Some(token) => user,
            _ => return Err(Status::TokenIsInvalid),
        };
        purge_deleted(&mut user.roles);
        Ok(f(user.roles.as_slice()))
    }

    fn token_holder<'a>(user: Option<&'a User>, token: &str) -> Result<&'a User, Status> {
        match user {
            Some(user) if user.token() == Some(token) => Ok(user),
            _ => Err(Status::TokenIsInvalid),
        }
    }

    /// Number of registered users (approximate).
    pub fn len(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    const HOUR_MICROS: i64 = 3_600_000_000;

    #[test]
    fn test_create_and_delete() {
        let users = UserStore::new(8);
        let tokens = TokenStore::new(8);

        assert_eq!(users.create("u1", "xxxx"), Status::UserCreated);
        assert_eq!(users.create("u1", "xxxx"), Status::UserAlreadyExisting);
        assert_eq!(users.len(), 1);

        assert_eq!(users.delete("u1", "yyyy", &tokens), Status::UserPasswordNotMatch);
        assert_eq!(users.delete("u1", "xxxx", &tokens), Status::UserDeleted);
        assert_eq!(users.delete("u1", "xxxx", &tokens), Status::UserNotFound);
        assert!(users.is_empty());
    }

    #[test]
    fn test_delete_severs_token() {
        let users = UserStore::new(8);
        let tokens = TokenStore::new(8);
        let now = SystemTime::now();
        users.create("u1", "xxxx");

        let (issued, _) = users
            .with_verified("u1", "xxxx", |u| tokens.issue_or_renew(u, HOUR_MICROS, now))
            .unwrap();

        assert_eq!(users.delete("u1", "xxxx", &tokens), Status::UserDeleted);
        let err = tokens.lookup_valid(&issued.id, now, |_| ()).unwrap_err();
        assert_eq!(err, Status::TokenIsInvalid);
    }

    #[test]
    fn test_with_verified_checks_password() {
        let users = UserStore::new(8);
        users.create("u1", "xxxx");

        assert_eq!(
            users.with_verified("u1", "nope", |_| ()).unwrap_err(),
            Status::UserPasswordNotMatch
        );
        assert_eq!(
            users.with_verified("u2", "xxxx", |_| ()).unwrap_err(),
            Status::UserNotFound
        );
        assert!(users.with_verified("u1", "xxxx", |_| ()).is_ok());
    }

    #[test]
    fn test_add_role() {
        let users = UserStore::new(8);
        let roles = RoleRegistry::new();

        assert_eq!(users.add_role("ghost", "r1", &roles), Status::UserNotFound);

        users.create("u1", "xxxx");
        assert_eq!(users.add_role("u1", "r1", &roles), Status::RoleNotFound);

        roles.create("r1");
        assert_eq!(users.add_role("u1", "r1", &roles), Status::UserRoleAdded);
        assert_eq!(users.add_role("u1", "r1", &roles), Status::UserRoleAlreadyExisting);
    }

    #[test]
    fn test_add_role_after_recreate() {
        let users = UserStore::new(8);
        let roles = RoleRegistry::new();
        users.create("u1", "xxxx");
        roles.create("r1");
        users.add_role("u1", "r1", &roles);

        roles.delete("r1");
        roles.create("r1");
        // The stale reference is purged, so the new role can be granted
        assert_eq!(users.add_role("u1", "r1", &roles), Status::UserRoleAdded);
    }

    #[test]
    fn test_with_live_roles_purges_tombstones() {
        let users = UserStore::new(8);
        let tokens = TokenStore::new(8);
        let roles = RoleRegistry::new();
        let now = SystemTime::now();

        users.create("u1", "xxxx");
        let (issued, _) = users
            .with_verified("u1", "xxxx", |u| tokens.issue_or_renew(u, HOUR_MICROS, now))
            .unwrap();
        for name in ["r1", "r2", "r3"] {
            roles.create(name);
            users.add_role("u1", name, &roles);
        }
        roles.delete("r2");

        let names = users
            .with_live_roles("u1", &issued.id, |rs| {
                rs.iter().map(|r| r.name().to_string()).collect::<Vec<_>>()
            })
            .unwrap();
        assert_eq!(names, vec!["r1", "r3"]);

        let stored = users
            .with_verified("u1", "xxxx", |u| u.roles().len())
            .unwrap();
        assert_eq!(stored, 2);
    }

    #[test]
    fn test_with_live_roles_requires_current_token() {
        let users = UserStore::new(8);
        users.create("u1", "xxxx");

        assert_eq!(
            users.with_live_roles("u1", "some-token", |_| ()).unwrap_err(),
            Status::TokenIsInvalid
        );
        assert_eq!(
            users.with_live_roles("ghost", "some-token", |_| ()).unwrap_err(),
            Status::TokenIsInvalid
        );
    }
}
