//! # API REST
//!
//! REST API implementation for MobileMed.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - REST-specific concerns (JSON bodies, status codes, CORS, request tracing)
//! - Optional API-key checks at the boundary
//!
//! Uses `api-shared` for wire types and `mobilemed-core` for every business rule.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use anyhow::Context;
use api_shared::HealthService;
use axum::{
    http::HeaderValue,
    middleware,
    routing::get,
    Router,
};
use mobilemed_core::{ExamLedger, PatientRegistry, Store};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Address used when `MOBILEMED_REST_ADDR` is not set.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// REST server configuration resolved at startup.
#[derive(Clone, Debug, Default)]
pub struct RestConfig {
    pub addr: String,
    pub api_key: Option<String>,
    pub cors_allowed_origin: Option<String>,
}

impl RestConfig {
    /// Build from optional raw environment values; blank values count as unset.
    pub fn from_env_values(
        addr: Option<String>,
        api_key: Option<String>,
        cors_allowed_origin: Option<String>,
    ) -> Self {
        let non_blank = |v: Option<String>| {
            v.map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            addr: non_blank(addr).unwrap_or_else(|| DEFAULT_REST_ADDR.into()),
            api_key: non_blank(api_key),
            cors_allowed_origin: non_blank(cors_allowed_origin),
        }
    }
}

/// Application state shared by all request handlers.
///
/// Both services hold clones of the same store, so cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    pub registry: PatientRegistry,
    pub ledger: ExamLedger,
    pub health: HealthService,
    pub max_page_size: u32,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Store, max_page_size: u32, api_key: Option<String>) -> Self {
        Self {
            registry: PatientRegistry::new(store.clone()),
            ledger: ExamLedger::new(store.clone()),
            health: HealthService::new(store),
            max_page_size,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// CORS policy: only `allowed_origin` when given, otherwise permissive.
///
/// # Errors
/// Returns an error if `allowed_origin` is not a valid header value.
pub fn cors_layer(allowed_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    match allowed_origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin: {origin}"))?;
            Ok(CorsLayer::very_permissive().allow_origin(origin))
        }
        None => Ok(CorsLayer::permissive()),
    }
}

/// Builds the full router.
///
/// `/health` is always open; the record routes sit behind [`handlers::require_api_key`].
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let records = Router::new()
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route(
            "/patients/:id",
            get(handlers::get_patient)
                .put(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .route(
            "/exams",
            get(handlers::list_exams).post(handlers::create_exam),
        )
        .route(
            "/exams/:id",
            get(handlers::get_exam)
                .put(handlers::update_exam)
                .delete(handlers::delete_exam),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(records)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_config_defaults_and_blanks() {
        let cfg = RestConfig::from_env_values(None, Some("  ".into()), None);
        assert_eq!(cfg.addr, DEFAULT_REST_ADDR);
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.cors_allowed_origin, None);
    }

    #[test]
    fn cors_layer_rejects_invalid_origin() {
        assert!(cors_layer(Some("http://localhost:4200")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
        assert!(cors_layer(None).is_ok());
    }
}
