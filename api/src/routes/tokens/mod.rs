use axum::{
    Router,
    routing::{delete, get},
};
use util::state::AppState;

mod delete;
mod get;

pub use delete::revoke_token;
pub use get::usage_stats;

pub fn tokens_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(usage_stats))
        .route("/{token_id}", delete(revoke_token))
}
