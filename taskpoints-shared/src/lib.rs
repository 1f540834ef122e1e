//! # TaskPoints Shared Library
//!
//! Domain types, storage and business services for the TaskPoints
//! gamification backend, used by the API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `store`: Storage traits with PostgreSQL and in-memory implementations
//! - `auth`: Password hashing, session tokens, bearer middleware
//! - `services`: Auth and user services
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the TaskPoints shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
