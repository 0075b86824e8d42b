//! Token Partition Store
//!
//! Session tokens, sharded by token id. Each token names its owner by username
//! rather than by pointer; clearing that name is how a token is detached from a
//! user.
//!
//! ## Token Lifecycle
//!
//! ```text
//!                 authenticate
//!   (absent) ───────────────────> live ──┐ authenticate (same id,
//!                                  │  ▲  │ expiry pushed forward)
//!                                  │  └──┘
//!        invalidate / delete user  │         clock passes expiry
//!              ┌───────────────────┴──────────────────┐
//!              ▼                                      ▼
//!           invalid                                expired
//!              │                                      │
//!              └────────── sweeper (after expiry) ────┴──> (absent)
//! ```
//!
//! Expired and invalid tokens stay in their shard, inert, until the sweeper
//! removes them. Lookups report `TokenExpired` / `TokenIsInvalid` until then and
//! `TokenNotFound` afterwards.

use crate::status::Status;
use crate::storage::partition::{mint_token_id, unix_micros, ShardSet};
use crate::storage::user::User;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

/// A stored session token.
#[derive(Debug)]
pub struct Token {
    id: String,
    expires_at_micros: i64,
    invalid: bool,
    user: Option<String>,
}

impl Token {
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute expiry, in microseconds since the Unix epoch.
    #[inline]
    pub fn expires_at_micros(&self) -> i64 {
        self.expires_at_micros
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Username of the owner, absent once the token has been detached.
    #[inline]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Strictly past expiry at `now_micros`.
    #[inline]
    pub fn is_expired_at(&self, now_micros: i64) -> bool {
        self.expires_at_micros < now_micros
    }

    /// Checks that the token is usable at `now_micros`.
    fn check_usable(&self, now_micros: i64) -> Result<(), Status> {
        if self.is_expired_at(now_micros) {
            return Err(Status::TokenExpired);
        }
        if self.invalid || self.user.is_none() {
            return Err(Status::TokenIsInvalid);
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.invalid = true;
        self.user = None;
    }
}

/// What a caller gets back from a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Opaque bearer credential
    pub id: String,
    /// Absolute expiry, in microseconds since the Unix epoch
    pub expires_at_micros: i64,
}

/// Sharded token storage.
#[derive(Debug)]
pub struct TokenStore {
    shards: ShardSet<Token>,

    /// Tokens physically present, including inert ones
    stored: AtomicU64,

    /// Tokens minted
    issued: AtomicU64,

    /// Renewals of existing tokens
    renewed: AtomicU64,

    /// Tokens removed by the sweeper
    swept: AtomicU64,
}

impl TokenStore {
    pub fn new(shard_count: usize) -> Self {
        Self {
            shards: ShardSet::new(shard_count),
            stored: AtomicU64::new(0),
            issued: AtomicU64::new(0),
            renewed: AtomicU64::new(0),
            swept: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Renews the user's current token, or mints a new one.
    ///
    /// The caller holds the exclusive lock on `user`'s shard; this takes the
    /// token shard lock inside it. A stored token that is not marked invalid is
    /// renewed even if its expiry has already passed.
    pub fn issue_or_renew(
        &self,
        user: &mut User,
        ttl_micros: i64,
        now: SystemTime,
    ) -> (IssuedToken, Status) {
        let expires_at_micros = unix_micros(now).saturating_add(ttl_micros);

        if let Some(id) = user.token() {
            let mut shard = self.shards.write(id);
            if let Some(token) = shard.get_mut(id) {
                if !token.invalid {
                    token.expires_at_micros = expires_at_micros;
                    self.renewed.fetch_add(1, Ordering::Relaxed);
                    debug!(user = user.name(), "Token renewed");
                    return (
                        IssuedToken {
                            id: id.to_string(),
                            expires_at_micros,
                        },
                        Status::TokenRenewed,
                    );
                }
            }
        }

        let id = mint_token_id(user.name(), user.password(), now);
        let token = Token {
            id: id.clone(),
            expires_at_micros,
            invalid: false,
            user: Some(user.name().to_string()),
        };

        if self.shards.write(&id).insert(id.clone(), token).is_none() {
            self.stored.fetch_add(1, Ordering::Relaxed);
        }
        self.issued.fetch_add(1, Ordering::Relaxed);
        user.set_token(Some(id.clone()));
        debug!(user = user.name(), "Token created");

        (
            IssuedToken {
                id,
                expires_at_micros,
            },
            Status::TokenCreated,
        )
    }

    /// Marks a usable token invalid and detaches it from its owner.
    pub fn invalidate(&self, id: &str, now: SystemTime) -> Status {
        let mut shard = self.shards.write(id);

        let Some(token) = shard.get_mut(id) else {
            return Status::TokenNotFound;
        };
        if let Err(status) = token.check_usable(unix_micros(now)) {
            return status;
        }
        token.detach();
        debug!("Token invalidated");
        Status::TokenInvalidated
    }

    /// Detaches a token from its owner regardless of its state.
    ///
    /// Used when the owner is deleted. Returns true if the token was still stored.
    pub fn sever(&self, id: &str) -> bool {
        let mut shard = self.shards.write(id);
        match shard.get_mut(id) {
            Some(token) => {
                token.detach();
                true
            }
            None => false,
        }
    }

    /// Runs `f` on the live record of a usable token, under a shared shard lock.
    pub fn lookup_valid<R>(
        &self,
        id: &str,
        now: SystemTime,
        f: impl FnOnce(&Token) -> R,
    ) -> Result<R, Status> {
        let shard = self.shards.read(id);
        let token = shard.get(id).ok_or(Status::TokenNotFound)?;
        token.check_usable(unix_micros(now))?;
        Ok(f(token))
    }

    /// Removes every token of one shard whose expiry is strictly before `now`.
    ///
    /// The invalid marker is not consulted. Returns the number removed.
    pub fn sweep_shard(&self, index: usize, now: SystemTime) -> usize {
        let now_micros = unix_micros(now);
        let mut shard = self.shards.write_at(index);

        let before = shard.len();
        shard.retain(|_, token| !token.is_expired_at(now_micros));
        let removed = before - shard.len();

        if removed > 0 {
            self.stored.fetch_sub(removed as u64, Ordering::Relaxed);
            self.swept.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Tokens physically stored (approximate).
    pub fn len(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn renewed_count(&self) -> u64 {
        self.renewed.load(Ordering::Relaxed)
    }

    pub fn swept_count(&self) -> u64 {
        self.swept.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const HOUR_MICROS: i64 = 3_600_000_000;

    fn user(name: &str) -> User {
        User::new(name, "pwd")
    }

    #[test]
    fn test_issue_then_renew() {
        let store = TokenStore::new(4);
        let mut u = user("u1");
        let t0 = SystemTime::now();

        let (first, status) = store.issue_or_renew(&mut u, HOUR_MICROS, t0);
        assert_eq!(status, Status::TokenCreated);
        assert_eq!(u.token(), Some(first.id.as_str()));

        let later = t0 + Duration::from_secs(5);
        let (second, status) = store.issue_or_renew(&mut u, HOUR_MICROS, later);
        assert_eq!(status, Status::TokenRenewed);
        assert_eq!(second.id, first.id);
        assert!(second.expires_at_micros > first.expires_at_micros);

        assert_eq!(store.len(), 1);
        assert_eq!(store.issued_count(), 1);
        assert_eq!(store.renewed_count(), 1);
    }

    #[test]
    fn test_renews_past_expiry_until_swept() {
        let store = TokenStore::new(1);
        let mut u = user("u1");
        let t0 = SystemTime::now();

        let (first, _) = store.issue_or_renew(&mut u, 10, t0);
        let late = t0 + Duration::from_secs(60);
        assert_eq!(
            store.invalidate(&first.id, late),
            Status::TokenExpired
        );

        let (renewed, status) = store.issue_or_renew(&mut u, HOUR_MICROS, late);
        assert_eq!(status, Status::TokenRenewed);
        assert_eq!(renewed.id, first.id);
        assert!(store.lookup_valid(&first.id, late, |_| ()).is_ok());
    }

    #[test]
    fn test_invalid_token_is_replaced() {
        let store = TokenStore::new(4);
        let mut u = user("u1");
        let t0 = SystemTime::now();

        let (first, _) = store.issue_or_renew(&mut u, HOUR_MICROS, t0);
        assert_eq!(store.invalidate(&first.id, t0), Status::TokenInvalidated);

        let (second, status) =
            store.issue_or_renew(&mut u, HOUR_MICROS, t0 + Duration::from_millis(1));
        assert_eq!(status, Status::TokenCreated);
        assert_ne!(second.id, first.id);
        assert_eq!(u.token(), Some(second.id.as_str()));
        // The invalidated token lingers until swept
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_swept_token_is_replaced() {
        let store = TokenStore::new(1);
        let mut u = user("u1");
        let t0 = SystemTime::now();

        let (first, _) = store.issue_or_renew(&mut u, 10, t0);
        let late = t0 + Duration::from_secs(1);
        assert_eq!(store.sweep_shard(0, late), 1);

        let (second, status) = store.issue_or_renew(&mut u, HOUR_MICROS, late);
        assert_eq!(status, Status::TokenCreated);
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn test_invalidate_taxonomy() {
        let store = TokenStore::new(4);
        let mut u = user("u1");
        let now = SystemTime::now();

        assert_eq!(store.invalidate("missing", now), Status::TokenNotFound);

        let (issued, _) = store.issue_or_renew(&mut u, HOUR_MICROS, now);
        assert_eq!(store.invalidate(&issued.id, now), Status::TokenInvalidated);
        assert_eq!(store.invalidate(&issued.id, now), Status::TokenIsInvalid);

        let expired_view = now + Duration::from_secs(2 * 3600);
        assert_eq!(store.invalidate(&issued.id, expired_view), Status::TokenExpired);
    }

    #[test]
    fn test_sever_detaches() {
        let store = TokenStore::new(4);
        let mut u = user("u1");
        let now = SystemTime::now();

        let (issued, _) = store.issue_or_renew(&mut u, HOUR_MICROS, now);
        assert!(store.sever(&issued.id));
        assert!(!store.sever("missing"));

        let err = store.lookup_valid(&issued.id, now, |_| ()).unwrap_err();
        assert_eq!(err, Status::TokenIsInvalid);
    }

    #[test]
    fn test_lookup_valid_exposes_owner() {
        let store = TokenStore::new(4);
        let mut u = user("alice");
        let now = SystemTime::now();

        let (issued, _) = store.issue_or_renew(&mut u, HOUR_MICROS, now);
        let owner = store
            .lookup_valid(&issued.id, now, |t| t.user().map(str::to_owned))
            .unwrap();
        assert_eq!(owner.as_deref(), Some("alice"));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = TokenStore::new(1);
        let now = SystemTime::now();

        let mut short = user("short");
        let mut long = user("long");
        let mut revoked = user("revoked");
        store.issue_or_renew(&mut short, 10, now);
        store.issue_or_renew(&mut long, HOUR_MICROS, now);
        let (r, _) = store.issue_or_renew(&mut revoked, HOUR_MICROS, now);
        store.invalidate(&r.id, now);

        let later = now + Duration::from_secs(1);
        assert_eq!(store.sweep_shard(0, later), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.swept_count(), 1);

        // Invalid tokens go once their own expiry passes
        let much_later = now + Duration::from_secs(2 * 3600);
        assert_eq!(store.sweep_shard(0, much_later), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_boundary_is_strict() {
        let store = TokenStore::new(1);
        let now = SystemTime::now();
        let mut u = user("u1");

        let (issued, _) = store.issue_or_renew(&mut u, 1_000, now);
        let at_expiry = now + Duration::from_micros(1_000);
        assert_eq!(store.sweep_shard(0, at_expiry), 0);
        assert!(store.lookup_valid(&issued.id, at_expiry, |_| ()).is_ok());
    }
}
