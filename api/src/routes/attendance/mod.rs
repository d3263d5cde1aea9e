use axum::{
    Router,
    routing::{post, put},
};
use util::state::AppState;

mod post;
mod put;

pub use post::scan_attendance;
pub use put::override_status;

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/scan", post(scan_attendance))
        .route("/{record_id}/status", put(override_status))
}
