//! # Web API Module
//!
//! Axum-based REST API exposing every scheduler operation over HTTP.
//!
//! ## Architecture Overview
//!
//! - Handlers are thin shells over the [`Scheduler`](crate::scheduler::Scheduler);
//!   no business rule lives in this layer
//! - Failures cross the boundary as `{ "error": { "code", "message" } }`
//!   envelopes, never as thrown exceptions or bare 500s
//! - `POST /v1/dequeue` supports long-polling: an empty claim parks on the
//!   in-process CREATED event stream until the server-side ceiling elapses
//!
//! ## Core Components
//!
//! - [`routes`] - HTTP route definitions
//! - [`handlers`] - request handlers per endpoint family
//! - [`state`] - shared application state
//! - [`error`] - error envelope and status mappings
//! - [`extract`] - envelope-preserving request extractors

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Create the Axum application with all routes and middleware
///
/// Sets up route definitions, the middleware stack (request timeout, CORS,
/// trace logging) and shared state.
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = std::time::Duration::from_millis(app_state.config.request_timeout_ms);

    Router::new()
        .merge(routes::health_routes())
        .nest("/v1", routes::api_v1_routes())
        .layer(tower_http::timeout::TimeoutLayer::new(request_timeout))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
