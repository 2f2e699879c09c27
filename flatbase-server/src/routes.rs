use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use log::debug;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the full route table. Split out from [`crate::serve`] so
/// integration tests can exercise it in-process via `tower::ServiceExt`
/// without binding a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/sigin", post(handlers::sigin))
        .route("/auth/login", post(handlers::login))
        .route("/auth/connect", post(handlers::connect))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/disconnect", get(handlers::disconnect))
        .route("/queries/", post(handlers::query))
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;
    debug!("{method} {uri} -> {}", response.status());
    response
}
