use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::routes::common::{AttendanceRecordResponse, SessionResponse, attendance_error};
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::error::AttendanceError;
use db::models::attendance_record::Model as Record;
use db::models::attendance_session::Model as Session;

/// GET /api/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<SessionResponse>>) {
    match Session::get_by_id(state.db(), session_id).await {
        Ok(Some(session)) => (
            StatusCode::OK,
            Json(ApiResponse::success(session.into(), "Session retrieved")),
        ),
        Ok(None) => attendance_error(AttendanceError::NotFound("session")),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}

/// GET /api/sessions/{session_id}/records
///
/// Lists the attendance entries recorded for a session. Restricted to the
/// session owner and admins.
pub async fn list_records(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<AttendanceRecordResponse>>>) {
    let db = state.db();

    let session = match Session::get_by_id(db, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return attendance_error(AttendanceError::NotFound("session")),
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    if session.created_by != claims.sub && !claims.admin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error(
                "Only the session owner may list its records",
            )),
        );
    }

    match Record::list_for_session(db, session_id).await {
        Ok(records) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                records.into_iter().map(Into::into).collect(),
                "Attendance records retrieved",
            )),
        ),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}
