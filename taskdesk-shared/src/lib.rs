//! # TaskDesk Shared Library
//!
//! Core of the TaskDesk task-management service: domain model, persistence,
//! authentication and use cases. The HTTP server in `taskdesk-api` is a thin
//! adapter over this crate.
//!
//! ## Module Organization
//!
//! - `clock`: Injectable time source
//! - `domain`: Entities, invariants and the authorization policy
//! - `db`: Unit of work, repositories, PostgreSQL and in-memory backends
//! - `auth`: Password hashing, JWT signing and session verification
//! - `usecase`: Signup, login, logout and task operations
//! - `error`: Crate-wide error type and its classification

pub mod auth;
pub mod clock;
pub mod db;
pub mod domain;
pub mod error;
pub mod usecase;

pub use error::{Error, ErrorKind, Result};

/// Current version of the TaskDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
