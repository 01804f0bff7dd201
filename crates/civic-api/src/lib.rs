//! # civic-api
//!
//! HTTP surface for civic-research: the query endpoint (ranked JSON for
//! keyword lookups, a server-sent event stream for questions), cached answer
//! replay, direct hybrid search and a health check.

pub mod error;
pub mod handlers;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use civic_core::defaults;

pub use error::ApiError;
pub use state::AppState;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Parse `ALLOWED_ORIGINS` (comma-separated) into CORS origins.
///
/// Defaults to `http://localhost:3000` when unset or empty. Invalid entries
/// are logged and skipped.
pub fn parse_allowed_origins(raw: Option<&str>) -> Vec<HeaderValue> {
    let origins_str = raw.unwrap_or("").trim();
    if origins_str.is_empty() {
        return vec![HeaderValue::from_static("http://localhost:3000")];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Build the application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let origins = parse_allowed_origins(std::env::var("ALLOWED_ORIGINS").ok().as_deref());

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/query", post(handlers::query))
        .route("/api/v1/answers/:id", get(handlers::get_answer))
        .route("/api/v1/search", get(handlers::search))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(origins))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state)
}
