// # Routes Module
//
// HTTP route handlers, one submodule per API area. Register new modules in
// `server::build_router`.

/// Health check endpoint
pub mod health;

/// Credential lifecycle endpoints under `/auth`
pub mod auth;

use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` extractor whose rejections use the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
