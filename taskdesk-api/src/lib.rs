//! # TaskDesk API Server Library
//!
//! HTTP adapter over `taskdesk-shared`: routing, bearer authentication,
//! request validation and error mapping. Generic over the storage backend
//! so integration tests can serve the same router from memory.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and auth middleware
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers layer
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
