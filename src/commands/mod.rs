//! Console Command Module
//!
//! A small text front end over the engine, used by the `flashauth` binary.
//! It receives one command per line, executes it against the engine and returns
//! a printable reply.
//!
//! ## Architecture
//!
//! ```text
//! stdin line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Split        │
//! │  - Validate     │
//! │  - Encode pwd   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   AuthEngine    │  (engine module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::{encode_password, CommandHandler, Reply};
