//! # Authentication Module
//!
//! Handles JWT issuance and validation, password hashing, the refresh token
//! hash cache, self-expiring action tokens and the middleware that resolves
//! the authenticated principal.

pub mod action_token;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod refresh_store;
