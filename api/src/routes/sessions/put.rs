use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::Deserialize;
use std::str::FromStr;

use crate::routes::common::{SessionResponse, attendance_error};
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::error::AttendanceError;
use db::models::attendance_session::{Model as Session, SessionStatus};

#[derive(Debug, Deserialize)]
pub struct EditSessionReq {
    pub venue: Option<String>,
    pub status: Option<String>,
}

/// PUT /api/sessions/{session_id}
///
/// Lets the owner adjust the venue or move the session through its
/// lifecycle (scheduled/ongoing/completed/cancelled).
pub async fn edit_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<EditSessionReq>,
) -> (StatusCode, Json<ApiResponse<SessionResponse>>) {
    let db = state.db();

    let status = match body.status.as_deref() {
        Some(raw) => match SessionStatus::from_str(raw) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                return attendance_error(AttendanceError::Validation(format!(
                    "unknown status '{raw}'"
                )));
            }
        },
        None => None,
    };

    let session = match Session::get_by_id(db, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return attendance_error(AttendanceError::NotFound("session")),
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    if session.created_by != claims.sub && !claims.admin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Only the session owner may edit it")),
        );
    }

    let mut active = session.into_active_model();
    if let Some(venue) = body.venue {
        active.venue = Set(venue);
    }
    if let Some(status) = status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now());

    match active.update(db).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(updated.into(), "Session updated")),
        ),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}
