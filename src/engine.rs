//! Authentication / Authorization Engine
//!
//! [`AuthEngine`] is the entry point for everything the crate does: user and role
//! management, authentication, token invalidation and role checks. It owns the
//! partitioned stores and the background sweeper, and is designed to be wrapped
//! in an `Arc` and shared across worker threads. All operations are synchronous
//! and only ever wait on shard locks.
//!
//! ## Request Flow
//!
//! ```text
//!   authenticate(name, pwd)
//!       │
//!       ├─> user shard (exclusive) ── check password
//!       │        │
//!       │        └─> token shard (exclusive) ── renew or mint
//!       ▼
//!   (IssuedToken, TokenCreated | TokenRenewed)
//!
//!   check_role(token, role)
//!       │
//!       ├─> token shard (shared) ── validate, read owner ── release
//!       │
//!       └─> owner's user shard ── purge tombstoned roles, test membership
//! ```

use crate::config::EngineConfig;
use crate::error::Result;
use crate::status::Status;
use crate::storage::{ExpirySweeper, IssuedToken, Role, RoleRegistry, TokenStore, UserStore};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// The in-process authentication and authorization engine.
///
/// Must be created inside a Tokio runtime, which hosts the token sweeper.
///
/// # Example
///
/// ```
/// use flashauth::{AuthEngine, EngineConfig, Status};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> flashauth::Result<()> {
/// let engine = AuthEngine::new(EngineConfig::default())?;
///
/// assert_eq!(engine.create_user("alice", "c2VjcmV0"), Status::UserCreated);
/// assert_eq!(engine.create_role("admin"), Status::RoleCreated);
/// assert_eq!(engine.add_user_role("alice", "admin"), Status::UserRoleAdded);
///
/// let (token, status) = engine.authenticate("alice", "c2VjcmV0");
/// assert_eq!(status, Status::TokenCreated);
///
/// let token = token.unwrap();
/// assert_eq!(engine.check_role(&token.id, "admin"), Status::TokenRoleOk);
///
/// engine.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct AuthEngine {
    users: UserStore,
    tokens: Arc<TokenStore>,
    roles: RoleRegistry,

    /// Token lifetime in microseconds
    token_ttl_micros: AtomicI64,

    sweeper: ExpirySweeper,
}

impl std::fmt::Debug for AuthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEngine")
            .field("users", &self.users.len())
            .field("roles", &self.roles.len())
            .field("tokens", &self.tokens.len())
            .field("token_ttl", &self.token_ttl())
            .finish()
    }
}

impl AuthEngine {
    /// Builds the stores and starts the background sweeper.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let tokens = Arc::new(TokenStore::new(config.token_shards));
        let sweeper = ExpirySweeper::start(Arc::clone(&tokens), config.sweep_interval)?;

        info!(
            user_shards = config.user_shards,
            token_shards = config.token_shards,
            token_ttl_secs = config.token_ttl.as_secs(),
            "Auth engine initialized"
        );

        Ok(Self {
            users: UserStore::new(config.user_shards),
            tokens,
            roles: RoleRegistry::new(),
            token_ttl_micros: AtomicI64::new(duration_micros(config.token_ttl)),
            sweeper,
        })
    }

    // ========================================================================
    // Users and roles
    // ========================================================================

    /// Registers a user with no token and no roles.
    pub fn create_user(&self, name: &str, password: &str) -> Status {
        self.users.create(name, password)
    }

    /// Deletes a user. Any token it holds becomes invalid immediately.
    pub fn delete_user(&self, name: &str, password: &str) -> Status {
        let status = self.users.delete(name, password, &self.tokens);
        if status == Status::UserDeleted {
            debug!(user = name, "User deleted");
        }
        status
    }

    /// Registers a role. A name freed by `delete_role` can be reused.
    pub fn create_role(&self, name: &str) -> Status {
        self.roles.create(name)
    }

    /// Deletes a role. Users that held it lose it the next time their roles are read.
    pub fn delete_role(&self, name: &str) -> Status {
        self.roles.delete(name)
    }

    /// Grants an existing role to a user.
    pub fn add_user_role(&self, user: &str, role: &str) -> Status {
        self.users.add_role(user, role, &self.roles)
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Checks credentials and issues a token, or renews the current one.
    ///
    /// Renewal keeps the id and pushes the expiry to now + TTL. A token that is
    /// past its expiry but neither invalidated nor swept yet is renewed too.
    pub fn authenticate(&self, name: &str, password: &str) -> (Option<IssuedToken>, Status) {
        let ttl_micros = self.token_ttl_micros.load(Ordering::Relaxed);
        let now = SystemTime::now();

        match self.users.with_verified(name, password, |user| {
            self.tokens.issue_or_renew(user, ttl_micros, now)
        }) {
            Ok((issued, status)) => (Some(issued), status),
            Err(status) => (None, status),
        }
    }

    /// Invalidates a usable token.
    pub fn invalidate(&self, token: &str) -> Status {
        self.tokens.invalidate(token, SystemTime::now())
    }

    // ========================================================================
    // Role membership
    // ========================================================================

    /// Tests whether the owner of `token` holds `role`.
    pub fn check_role(&self, token: &str, role: &str) -> Status {
        match self.with_owner_roles(token, |roles| roles.iter().any(|r| r.name() == role)) {
            Ok(true) => Status::TokenRoleOk,
            Ok(false) => Status::TokenRoleNotFound,
            Err(status) => status,
        }
    }

    /// Lists the roles of the owner of `token`, in the order they were granted.
    pub fn all_roles(&self, token: &str) -> (Vec<String>, Status) {
        match self.with_owner_roles(token, |roles| {
            roles.iter().map(|r| r.name().to_string()).collect()
        }) {
            Ok(names) => (names, Status::Ok),
            Err(status) => (Vec::new(), status),
        }
    }

    /// Resolves the token's owner, then runs `f` on the owner's live roles.
    ///
    /// The token shard is released before the user shard is locked.
    fn with_owner_roles<R>(
        &self,
        token: &str,
        f: impl FnOnce(&[Arc<Role>]) -> R,
    ) -> std::result::Result<R, Status> {
        let owner = self
            .tokens
            .lookup_valid(token, SystemTime::now(), |t| t.user().map(str::to_owned))?
            .ok_or(Status::TokenIsInvalid)?;
        self.users.with_live_roles(&owner, token, f)
    }

    // ========================================================================
    // Configuration and lifecycle
    // ========================================================================

    /// Sets the lifetime of tokens issued or renewed from now on.
    ///
    /// Meant to be called before serving traffic.
    pub fn set_token_ttl(&self, ttl: Duration) {
        self.token_ttl_micros
            .store(duration_micros(ttl), Ordering::Relaxed);
        info!(token_ttl_ms = ttl.as_millis() as u64, "Token TTL updated");
    }

    pub fn token_ttl(&self) -> Duration {
        let micros = self.token_ttl_micros.load(Ordering::Relaxed);
        Duration::from_micros(micros.max(0) as u64)
    }

    /// Stops the background sweeper. Safe to call more than once.
    pub fn shutdown(&self) {
        self.sweeper.stop();
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            users: self.users.len(),
            roles: self.roles.len() as u64,
            tokens: self.tokens.len(),
            tokens_issued: self.tokens.issued_count(),
            tokens_renewed: self.tokens.renewed_count(),
            tokens_swept: self.tokens.swept_count(),
        }
    }
}

fn duration_micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

/// Engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Registered users
    pub users: u64,
    /// Registered roles
    pub roles: u64,
    /// Tokens physically stored, including expired and invalid ones
    pub tokens: u64,
    /// Tokens minted
    pub tokens_issued: u64,
    /// Token renewals
    pub tokens_renewed: u64,
    /// Tokens removed by the sweeper
    pub tokens_swept: u64,
}
