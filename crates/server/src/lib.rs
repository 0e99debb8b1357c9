//! HTTP front of the quiz progress sync service.
//!
//! Every `/api/sync/*` route acts on the record of the user asserted by the
//! access proxy; see [`auth`].

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header::CONTENT_TYPE},
    middleware::{from_fn, from_fn_with_state},
    routing::{MethodRouter, get, post},
};
use services::{ConsistencyService, SYNC_KEY_HEADER, SYNC_USER_HEADER, SyncService};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
mod routes;

pub use config::Config;
pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub sync: SyncService,
    pub consistency: ConsistencyService,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(sync: SyncService, consistency: ConsistencyService, config: Config) -> Self {
        Self {
            sync,
            consistency,
            config: Arc::new(config),
        }
    }
}

/// Answer other methods with the JSON error body instead of an empty 405.
fn or_405(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(routes::method_not_allowed)
}

fn cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "origin is not a valid header value, skipped for CORS");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(SYNC_KEY_HEADER)])
        .expose_headers([
            HeaderName::from_static(SYNC_KEY_HEADER),
            HeaderName::from_static(SYNC_USER_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/init", or_405(post(routes::init)))
        .route("/state", or_405(get(routes::state)))
        .route("/merge", or_405(post(routes::merge)))
        .route("/reset", or_405(post(routes::reset)))
        .route("/reset_qid", or_405(post(routes::reset_qid)))
        .route("/reset_all_qid", or_405(post(routes::reset_all_qid)))
        .route("/reset_streak3_qid", or_405(post(routes::reset_streak3_qid)))
        .route("/reset_streak3_today", or_405(post(routes::reset_streak3_today)))
        .route(
            "/reset_once_per_day_today",
            or_405(post(routes::reset_once_per_day_today)),
        )
        .route("/completely_delete", or_405(post(routes::completely_delete)));

    let consistency = get(routes::consistency_get)
        .post(routes::consistency_post)
        .delete(routes::consistency_delete);

    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/sync-consistency", or_405(consistency))
        .nest("/api/sync", api)
        .layer(from_fn_with_state(state.clone(), middleware::origin_guard))
        .layer(cors(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::request_tracing))
        .with_state(state)
}
