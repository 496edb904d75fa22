//! # Services Module
//!
//! Business logic invoked by the route handlers.

pub mod auth_service;

pub use auth_service::AuthService;
