//! # TaskPoints API Server Library
//!
//! HTTP layer for the TaskPoints backend: configuration, routing and the
//! mapping from service errors to responses.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
