//! # Corpdesk Shared Library
//!
//! Domain types, persistence and access-control logic shared by the Corpdesk
//! API server and its tests.
//!
//! ## Module Organization
//!
//! - `models`: Database models, derived fields and the approval state machine
//! - `auth`: Token issuance, password hashing and the permission evaluator
//! - `db`: Connection pool and embedded migrations

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the Corpdesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
