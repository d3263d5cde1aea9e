use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

use crate::routes::common::attendance_error;
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::error::AttendanceError;
use db::models::attendance_session::Model as Session;

/// DELETE /api/sessions/{session_id}
///
/// Soft delete: flips the active flag so subsequent scans reject with
/// "session unavailable". Recorded entries stay queryable.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let db = state.db();

    let session = match Session::get_by_id(db, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return attendance_error(AttendanceError::NotFound("session")),
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    if session.created_by != claims.sub && !claims.admin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Only the session owner may delete it")),
        );
    }

    if !session.active {
        return (
            StatusCode::OK,
            Json(ApiResponse::success((), "Session deactivated")),
        );
    }

    let mut active = session.into_active_model();
    active.active = Set(false);
    active.updated_at = Set(Utc::now());

    match active.update(db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Session deactivated")),
        ),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}
