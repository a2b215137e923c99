//! Axum HTTP/SSE API server.
//!
//! This crate provides:
//! - Sequence submission (generate and remix) with 202 + stream URL
//! - Server-sent progress streams and stored results
//! - Stitching and download of generated shots
//! - Firebase ID token verification, rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
