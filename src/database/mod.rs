//! # Database Module
//!
//! PostgreSQL integration using tokio-postgres with a deadpool connection pool.
//! Includes connection management, models, migrations and the user repository.

pub mod connection;
pub mod migrations;
pub mod models;
pub mod users;

pub use connection::{DatabaseConnection, PoolConfig};
pub use models::*;
pub use users::UserRepository;
