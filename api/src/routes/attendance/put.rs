use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::routes::common::{AttendanceRecordResponse, attendance_error};
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::error::AttendanceError;
use db::models::attendance_record::{AttendanceStatus, Model as Record};
use db::models::attendance_session::Model as Session;

#[derive(Debug, Deserialize)]
pub struct OverrideStatusReq {
    pub status: String,
}

/// PUT /api/attendance/{record_id}/status
///
/// Administrative reclassification of a recorded entry. The computed status
/// stays on the record; the override is stored alongside it with the
/// correcting actor.
pub async fn override_status(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<OverrideStatusReq>,
) -> (StatusCode, Json<ApiResponse<AttendanceRecordResponse>>) {
    let db = state.db();

    let status = match AttendanceStatus::from_str(&body.status) {
        Ok(status) => status,
        Err(_) => {
            return attendance_error(AttendanceError::Validation(format!(
                "unknown status '{}'",
                body.status
            )));
        }
    };

    let record = match Record::get_by_id(db, record_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return attendance_error(AttendanceError::NotFound("attendance record")),
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    let session = match Session::get_by_id(db, record.session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return attendance_error(AttendanceError::NotFound("session")),
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    if session.created_by != claims.sub && !claims.admin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error(
                "Only the session owner may override attendance",
            )),
        );
    }

    match Record::override_status(db, record_id, status, claims.sub).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                updated.into(),
                "Attendance status overridden",
            )),
        ),
        Err(e) => attendance_error(e),
    }
}
