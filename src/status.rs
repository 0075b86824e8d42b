//! Status Codes
//!
//! Every engine operation answers with one [`Status`] from a closed set. Expected
//! business outcomes (already exists, not found, expired, wrong password) are
//! statuses, never panics or errors.
//!
//! ## Code Layout
//!
//! ```text
//! 1xxxx  Unknown        (reserved)
//! 2xxxx  Success        UserCreated, TokenRenewed, ...
//! 4xxxx  Client error   UserNotFound, TokenExpired, ...
//! 5xxxx  Server error   Internal (reserved for the boundary layer)
//! ```
//!
//! The numeric codes are kept identical to the ones clients of the original
//! service already understand; `code / 100` yields the transport status.

use std::fmt;

/// Outcome of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    Unknown = 10000,

    Ok = 20001,
    UserCreated = 20002,
    UserDeleted = 20003,
    UserRoleAdded = 20004,
    RoleCreated = 20005,
    RoleDeleted = 20006,
    TokenRenewed = 20007,
    TokenCreated = 20008,
    TokenInvalidated = 20009,
    TokenRoleOk = 20010,

    InvalidArgument = 40011,
    UserAlreadyExisting = 40012,
    UserNotFound = 40013,
    UserPasswordNotMatch = 40014,
    UserRoleAlreadyExisting = 40015,
    RoleAlreadyExisting = 40016,
    RoleNotFound = 40017,
    TokenNotFound = 40018,
    TokenExpired = 40019,
    TokenIsInvalid = 40020,
    TokenRoleNotFound = 40021,

    Internal = 50000,
}

/// Coarse classification of a [`Status`], mirroring transport status classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Unknown,
    Success,
    ClientError,
    ServerError,
}

impl Status {
    /// Numeric wire code.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Transport-level status code (`200`, `400`, `500`, or `100` for `Unknown`).
    #[inline]
    pub fn http_code(self) -> u16 {
        (self.code() / 100) as u16
    }

    pub fn class(self) -> StatusClass {
        match self.code() / 10000 {
            2 => StatusClass::Success,
            4 => StatusClass::ClientError,
            5 => StatusClass::ServerError,
            _ => StatusClass::Unknown,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self.class() == StatusClass::Success
    }

    /// Human-readable description, as sent back to clients.
    pub fn description(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Ok => "ok",
            Status::UserCreated => "user created",
            Status::UserDeleted => "user deleted",
            Status::UserRoleAdded => "user role added",
            Status::RoleCreated => "role created",
            Status::RoleDeleted => "role deleted",
            Status::TokenRenewed => "token renewed",
            Status::TokenCreated => "token created",
            Status::TokenInvalidated => "token invalidated",
            Status::TokenRoleOk => "token role ok",
            Status::InvalidArgument => "invalid argument",
            Status::UserAlreadyExisting => "user already existing",
            Status::UserNotFound => "user not found",
            Status::UserPasswordNotMatch => "user password not match",
            Status::UserRoleAlreadyExisting => "user role already existing",
            Status::RoleAlreadyExisting => "role already existing",
            Status::RoleNotFound => "role not found",
            Status::TokenNotFound => "token not found",
            Status::TokenExpired => "token expired",
            Status::TokenIsInvalid => "token is invalid",
            Status::TokenRoleNotFound => "token role not found",
            Status::Internal => "internal",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_values() {
        assert_eq!(Status::Ok.code(), 20001);
        assert_eq!(Status::TokenRoleOk.code(), 20010);
        assert_eq!(Status::InvalidArgument.code(), 40011);
        assert_eq!(Status::TokenRoleNotFound.code(), 40021);
        assert_eq!(Status::Internal.code(), 50000);
    }

    #[test]
    fn test_http_code() {
        assert_eq!(Status::UserCreated.http_code(), 200);
        assert_eq!(Status::TokenExpired.http_code(), 400);
        assert_eq!(Status::Internal.http_code(), 500);
        assert_eq!(Status::Unknown.http_code(), 100);
    }

    #[test]
    fn test_class() {
        assert!(Status::TokenRenewed.is_success());
        assert_eq!(Status::RoleNotFound.class(), StatusClass::ClientError);
        assert_eq!(Status::Internal.class(), StatusClass::ServerError);
        assert_eq!(Status::Unknown.class(), StatusClass::Unknown);
        assert!(!Status::Unknown.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::UserPasswordNotMatch.to_string(), "user password not match");
        assert_eq!(Status::TokenIsInvalid.to_string(), "token is invalid");
    }
}
