/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Signup, login and logout
/// - `users`: User directory for picking assignees
/// - `tasks`: Task CRUD and assignment

pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;
