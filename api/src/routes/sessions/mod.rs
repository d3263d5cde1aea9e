use axum::{
    Router,
    routing::{delete, get, post, put},
};
use util::state::AppState;

mod delete;
mod get;
mod post;
mod put;

pub use delete::delete_session;
pub use get::{get_session, list_records};
pub use post::{create_session, reissue_token};
pub use put::edit_session;

pub fn sessions_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}", put(edit_session))
        .route("/{session_id}", delete(delete_session))
        .route("/{session_id}/token", post(reissue_token))
        .route("/{session_id}/records", get(list_records))
}
