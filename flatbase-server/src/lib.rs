//! HTTP surface for flatbase: wires the catalog and auth manager into an
//! axum router exposing the login/connect/refresh/disconnect and query
//! endpoints, and streams query results as a single chunked JSON array.

pub mod config;
pub mod error;
mod handlers;
mod routes;
pub mod state;

use std::sync::Arc;

use flatbase_auth::AuthManager;
use flatbase_engine::Catalog;
use log::info;
use tokio::net::TcpListener;

pub use config::ServerOptions;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

/// Load the catalog and user store described by `opts`, build the
/// shared state, and serve forever.
pub async fn serve(opts: &ServerOptions) -> std::io::Result<()> {
    let catalog = Catalog::load(opts.storage_root())
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let auth = AuthManager::new(
        opts.user_store_path(),
        opts.hmac_secret().clone(),
        flatbase_auth::TokenLifetimes {
            access_minutes: *opts.access_token_minutes(),
            refresh_days: *opts.refresh_token_days(),
        },
    )
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))?;

    let state = AppState {
        catalog: Arc::new(catalog),
        auth: Arc::new(auth),
    };

    serve_with_state(state, opts).await
}

/// Serve a pre-built [`AppState`]. Split out from [`serve`] so callers
/// that construct the catalog/auth manager themselves (tests, embedders)
/// can skip the on-disk load.
pub async fn serve_with_state(state: AppState, opts: &ServerOptions) -> std::io::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(opts.bind_addr()).await?;
    info!("listening on {}", opts.bind_addr());
    axum::serve(listener, app).await
}
