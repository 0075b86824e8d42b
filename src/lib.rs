//! # FlashAuth - An In-Process Authentication and Authorization Engine
//!
//! FlashAuth stores users, roles and session tokens in memory, validates
//! credentials, issues and expires tokens, and answers role-membership queries.
//!
//! ## Features
//!
//! - **Sharded Storage**: Users and tokens live in independently locked shards
//! - **Token Lifecycle**: Tokens are created, renewed in place, invalidated and expired
//! - **Lazy Role Cleanup**: Deleted roles disappear from users on their next read
//! - **Background Sweeping**: A Tokio task reclaims expired tokens one shard at a time
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              AuthEngine                                 │
//! │                                                                         │
//! │  ┌──────────────────────────┐        ┌──────────────────────────┐       │
//! │  │        UserStore         │ ─────> │        TokenStore        │       │
//! │  │ ┌──────┐┌──────┐┌──────┐ │ token  │ ┌──────┐┌──────┐┌──────┐ │       │
//! │  │ │Shard0││Shard1││...N  │ │  id    │ │Shard0││Shard1││...M  │ │       │
//! │  │ │RwLock││RwLock││      │ │ <───── │ │RwLock││RwLock││      │ │       │
//! │  │ └──────┘└──────┘└──────┘ │  owner │ └──────┘└──────┘└──────┘ │       │
//! │  └────────────┬─────────────┘        └────────────▲─────────────┘       │
//! │               │ Arc<Role>                         │                     │
//! │               ▼                                   │ one shard per tick  │
//! │  ┌──────────────────────────┐        ┌────────────┴─────────────┐       │
//! │  │  RoleRegistry (RwLock)   │        │      ExpirySweeper       │       │
//! │  └──────────────────────────┘        │  (Background Tokio Task) │       │
//! │                                      └──────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashauth::{AuthEngine, EngineConfig, Status};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> flashauth::Result<()> {
//!     let engine = Arc::new(AuthEngine::new(EngineConfig::default())?);
//!
//!     engine.create_user("alice", "c2VjcmV0");
//!     let (token, status) = engine.authenticate("alice", "c2VjcmV0");
//!     assert_eq!(status, Status::TokenCreated);
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`engine`]: The facade exposing every operation
//! - [`storage`]: Partitioned stores, role registry and the token sweeper
//! - [`status`]: The closed set of operation outcomes
//! - [`config`]: Engine configuration
//! - [`commands`]: Text console over the engine
//!
//! ## Design Highlights
//!
//! ### Lock Ordering
//!
//! Operations that touch both stores lock the user shard first and the token
//! shard second. Role checks read the token, release it, then lock the user.
//! No path acquires a user shard while holding a token shard.
//!
//! ### References by Key
//!
//! A user stores the id of its token and a token stores its owner's name.
//! Detaching them is clearing a key, and a lookup through the owning store is
//! always the source of truth.
//!
//! ### Passwords
//!
//! Passwords arrive already encoded by the caller and are compared as opaque
//! strings. The console's encoding is reversible; it is not a password hash.

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod status;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Reply};
pub use config::EngineConfig;
pub use engine::{AuthEngine, EngineStats};
pub use error::{Error, Result};
pub use status::{Status, StatusClass};
pub use storage::IssuedToken;

/// Version of FlashAuth
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
