//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → health probe (public)
//! - `/sessions` → issuance and session management (authenticated)
//! - `/attendance` → scan intake and administrative overrides (authenticated)
//! - `/tokens` → revocation and usage statistics (authenticated)

use axum::{Router, middleware::from_fn};
use util::state::AppState;

use crate::auth::guards::allow_authenticated;

pub mod attendance;
pub mod common;
pub mod health;
pub mod sessions;
pub mod tokens;

use attendance::attendance_routes;
use health::health_routes;
use sessions::sessions_routes;
use tokens::tokens_routes;

/// Builds the complete application router. Everything except `/health` sits
/// behind the authentication guard; finer-grained ownership checks live in
/// the handlers, which compare the caller against the session owner.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/sessions",
            sessions_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/attendance",
            attendance_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest(
            "/tokens",
            tokens_routes().route_layer(from_fn(allow_authenticated)),
        )
        .with_state(app_state)
}
