//! # API Shared
//!
//! Shared utilities and definitions for the MobileMed API.
//!
//! Contains:
//! - Wire types for requests, queries and error bodies (`dto` module)
//! - Shared services like `HealthService`
//! - API-key validation
//!
//! Used by `api-rest`; kept separate so the wire contract does not depend on axum.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use dto::*;
pub use health::HealthService;
