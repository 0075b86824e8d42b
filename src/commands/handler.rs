//! Console Command Handler
//!
//! Parses one line of text into an engine call and renders the outcome.
//!
//! ## Supported Commands
//!
//! ### Users and Roles
//! - `CREATEUSER name password` - Register a user
//! - `DELETEUSER name password` - Remove a user (its token becomes invalid)
//! - `CREATEROLE role` - Register a role
//! - `DELETEROLE role` - Remove a role from every user
//! - `ADDROLE name role` - Grant a role to a user
//!
//! ### Tokens
//! - `AUTH name password` - Issue or renew a token
//! - `INVALIDATE token` - Invalidate a token
//! - `CHECKROLE token role` - Check that the token's owner holds a role
//! - `ROLES token` - List the token owner's roles
//!
//! ### Server
//! - `PING` - Test the console
//! - `STATS` - Engine statistics
//! - `HELP` - List commands
//! - `QUIT` - Close the console
//!
//! ## Replies
//!
//! ```text
//! <transport code> <status code> <description>
//! [payload line]...
//! ```
//!
//! e.g. `200 20008 token created` followed by `token <id>` and
//! `expires_at_micros <n>`.
//!
//! Passwords are typed in clear and encoded with URL-safe base64 before they
//! reach the engine. This is an encoding convention, not a hash.

use crate::engine::AuthEngine;
use crate::status::Status;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use std::fmt;
use std::sync::Arc;

const HELP: &[&str] = &[
    "CREATEUSER name password",
    "DELETEUSER name password",
    "CREATEROLE role",
    "DELETEROLE role",
    "ADDROLE name role",
    "AUTH name password",
    "INVALIDATE token",
    "CHECKROLE token role",
    "ROLES token",
    "PING",
    "STATS",
    "HELP",
    "QUIT",
];

/// Encodes a clear-text password the way the engine expects to receive it.
pub fn encode_password(raw: &str) -> String {
    URL_SAFE.encode(raw)
}

/// The response to one console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    /// Payload lines printed after the status line
    pub lines: Vec<String>,
    /// Set when the client asked to close the console
    pub quit: bool,
}

impl Reply {
    fn status(status: Status) -> Self {
        Self {
            status,
            lines: Vec::new(),
            quit: false,
        }
    }

    fn with_lines(status: Status, lines: Vec<String>) -> Self {
        Self {
            status,
            lines,
            quit: false,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::with_lines(Status::InvalidArgument, vec![message.into()])
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.status.http_code(),
            self.status.code(),
            self.status
        )?;
        for line in &self.lines {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

/// Handles console commands by dispatching them to the engine.
#[derive(Clone)]
pub struct CommandHandler {
    engine: Arc<AuthEngine>,
}

impl CommandHandler {
    pub fn new(engine: Arc<AuthEngine>) -> Self {
        Self { engine }
    }

    /// Executes one command line and returns the reply.
    pub fn execute(&self, line: &str) -> Reply {
        let mut words = line.split_whitespace();

        let Some(cmd) = words.next() else {
            return Reply::invalid("empty command");
        };
        let args: Vec<&str> = words.collect();

        self.dispatch(&cmd.to_uppercase(), &args)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[&str]) -> Reply {
        match cmd {
            "CREATEUSER" => self.cmd_create_user(args),
            "DELETEUSER" => self.cmd_delete_user(args),
            "CREATEROLE" => self.cmd_create_role(args),
            "DELETEROLE" => self.cmd_delete_role(args),
            "ADDROLE" => self.cmd_add_role(args),
            "AUTH" => self.cmd_auth(args),
            "INVALIDATE" => self.cmd_invalidate(args),
            "CHECKROLE" => self.cmd_check_role(args),
            "ROLES" => self.cmd_roles(args),
            "PING" => Reply::with_lines(Status::Ok, vec!["PONG".to_string()]),
            "STATS" => self.cmd_stats(),
            "HELP" => Reply::with_lines(Status::Ok, HELP.iter().map(|s| s.to_string()).collect()),
            "QUIT" => Reply {
                quit: true,
                ..Reply::status(Status::Ok)
            },
            _ => Reply::invalid(format!("unknown command '{}'", cmd)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    /// Splits `args` into exactly `N` values.
    fn arity<'a, const N: usize>(cmd: &str, args: &[&'a str]) -> Result<[&'a str; N], Reply> {
        <[&str; N]>::try_from(args).map_err(|_| {
            Reply::invalid(format!(
                "wrong number of arguments for '{}': expected {}, got {}",
                cmd,
                N,
                args.len()
            ))
        })
    }

    // ========================================================================
    // Users and roles
    // ========================================================================

    fn cmd_create_user(&self, args: &[&str]) -> Reply {
        match Self::arity::<2>("createuser", args) {
            Ok([name, password]) => {
                Reply::status(self.engine.create_user(name, &encode_password(password)))
            }
            Err(reply) => reply,
        }
    }

    fn cmd_delete_user(&self, args: &[&str]) -> Reply {
        match Self::arity::<2>("deleteuser", args) {
            Ok([name, password]) => {
                Reply::status(self.engine.delete_user(name, &encode_password(password)))
            }
            Err(reply) => reply,
        }
    }

    fn cmd_create_role(&self, args: &[&str]) -> Reply {
        match Self::arity::<1>("createrole", args) {
            Ok([role]) => Reply::status(self.engine.create_role(role)),
            Err(reply) => reply,
        }
    }

    fn cmd_delete_role(&self, args: &[&str]) -> Reply {
        match Self::arity::<1>("deleterole", args) {
            Ok([role]) => Reply::status(self.engine.delete_role(role)),
            Err(reply) => reply,
        }
    }

    fn cmd_add_role(&self, args: &[&str]) -> Reply {
        match Self::arity::<2>("addrole", args) {
            Ok([name, role]) => Reply::status(self.engine.add_user_role(name, role)),
            Err(reply) => reply,
        }
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    fn cmd_auth(&self, args: &[&str]) -> Reply {
        let [name, password] = match Self::arity::<2>("auth", args) {
            Ok(args) => args,
            Err(reply) => return reply,
        };

        match self.engine.authenticate(name, &encode_password(password)) {
            (Some(token), status) => Reply::with_lines(
                status,
                vec![
                    format!("token {}", token.id),
                    format!("expires_at_micros {}", token.expires_at_micros),
                ],
            ),
            (None, status) => Reply::status(status),
        }
    }

    fn cmd_invalidate(&self, args: &[&str]) -> Reply {
        match Self::arity::<1>("invalidate", args) {
            Ok([token]) => Reply::status(self.engine.invalidate(token)),
            Err(reply) => reply,
        }
    }

    fn cmd_check_role(&self, args: &[&str]) -> Reply {
        match Self::arity::<2>("checkrole", args) {
            Ok([token, role]) => Reply::status(self.engine.check_role(token, role)),
            Err(reply) => reply,
        }
    }

    fn cmd_roles(&self, args: &[&str]) -> Reply {
        match Self::arity::<1>("roles", args) {
            Ok([token]) => {
                let (roles, status) = self.engine.all_roles(token);
                Reply::with_lines(status, roles)
            }
            Err(reply) => reply,
        }
    }

    // ========================================================================
    // Server
    // ========================================================================

    fn cmd_stats(&self) -> Reply {
        let stats = self.engine.stats();
        Reply::with_lines(
            Status::Ok,
            vec![
                format!("users {}", stats.users),
                format!("roles {}", stats.roles),
                format!("tokens {}", stats.tokens),
                format!("tokens_issued {}", stats.tokens_issued),
                format!("tokens_renewed {}", stats.tokens_renewed),
                format!("tokens_swept {}", stats.tokens_swept),
            ],
        )
    }
}
