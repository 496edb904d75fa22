//! # Rentacar Server
//!
//! Credential lifecycle for the car-rental booking API: an axum server that
//! issues and validates access/refresh JWTs and runs the password reset and
//! account verification flows, plus a typed API client that refreshes an
//! expired access token transparently.
//!
//! ## Architecture
//! - `server`: router construction and startup
//! - `config`: environment variable configuration
//! - `auth`: JWTs, password hashing, refresh token cache, action tokens, middleware
//! - `services`: the auth service behind the routes
//! - `routes`: HTTP handlers (`/ping`, `/auth/*`)
//! - `database`: Postgres pool, migrations, user repository
//! - `mail`: reset/verification mail delivery
//! - `client`: API client with token storage and refresh coordination

pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod mail;
pub mod routes;
pub mod server;
pub mod services;
