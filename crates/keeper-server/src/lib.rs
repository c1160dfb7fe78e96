//! HTTP + WebSocket server for the account/vault/key protocol in spec.md
//! §4.5-§4.9. Grounded on `citadel-api/src/main.rs`'s app/state/router shape.

mod auth_middleware;
mod error;
mod rate_limit;
mod routes;
mod state;
mod tls;
mod ws;

pub use error::ApiError;
pub use state::{AppState, Shared};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use keeper_store::StorageBackend;
use tower_http::cors::{Any, CorsLayer};

/// Builds the router in isolation from TLS/socket bootstrap so tests can
/// drive it in-process with `tower::ServiceExt::oneshot`.
pub fn app(state: Shared) -> Router {
    let authenticated = Router::new()
        .route("/api/v1/keeper/remove", post(routes::remove))
        .route("/api/v1/keeper/push", post(routes::push))
        .route("/api/v1/keeper/pull", get(routes::pull))
        .route("/api/v1/keeper/pull/versions", get(routes::pull_versions))
        .route("/api/v1/keeper/pgp/list", get(routes::pgp_list))
        .route("/api/v1/keeper/pgp/add", post(routes::pgp_add))
        .route("/api/v1/keeper/pgp/confirm", post(routes::pgp_confirm))
        .route("/api/v1/keeper/pgp/revoke", post(routes::pgp_revoke))
        .route("/api/v1/keeper/logs", get(routes::logs))
        .route("/api/v1/keeper/ws", get(ws::ws_upgrade))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware::auth_middleware));

    let rate_limited = Router::new()
        .route("/api/v1/signup", post(routes::signup))
        .route("/api/v1/signin", post(routes::signin))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_middleware));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/v1/ping", get(routes::ping))
        .merge(authenticated)
        .merge(rate_limited)
        .layer(cors)
        .with_state(state)
}

/// Binds the listening address and serves the app over self-issued TLS
/// until the process is killed. `store` picks the backend (in-memory for
/// standalone/dev, Postgres for the client-server deployment).
pub async fn serve(addr: SocketAddr, store: Arc<dyn StorageBackend>) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(store);
    let tls_config = tls::bootstrap().await?;

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.rate_limiter.cleanup().await;
        }
    });

    state.bus.clone().spawn_sweeper();

    let router = app(state);
    tracing::info!(%addr, "starting keeper-server");
    axum_server::bind_rustls(addr, tls_config)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
