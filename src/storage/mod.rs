//! Storage Module
//!
//! The partitioned stores behind the engine and the background sweeper that
//! reclaims expired tokens.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  UserStore                       TokenStore                  │
//! │  ┌────────┐┌────────┐┌──────┐    ┌────────┐┌────────┐┌──────┐│
//! │  │Shard 0 ││Shard 1 ││...N  │ ─> │Shard 0 ││Shard 1 ││...M  ││
//! │  │RwLock  ││RwLock  ││      │    │RwLock  ││RwLock  ││      ││
//! │  └────────┘└────────┘└──────┘    └────────┘└────────┘└──────┘│
//! │       │                                ▲                     │
//! │       ▼                                │ one shard per tick  │
//! │  RoleRegistry (one RwLock)       ExpirySweeper (Tokio task)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records reference each other by key: a user stores its token id, a token
//! stores its owner's name, and a user shares `Arc<Role>` records with the
//! registry.

pub mod expiry;
pub mod partition;
pub mod role;
pub mod token;
pub mod user;

// Re-export commonly used types
pub use expiry::ExpirySweeper;
pub use partition::{mint_token_id, shard_index, unix_micros, ShardSet};
pub use role::{Role, RoleRegistry};
pub use token::{IssuedToken, Token, TokenStore};
pub use user::{User, UserStore};
