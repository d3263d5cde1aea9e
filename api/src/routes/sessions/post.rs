use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::routes::common::{
    QrPayload, UNIT_CODE_RE, attendance_error, format_validation_errors, parse_session_date,
    parse_wall_time,
};
use crate::{auth::AuthUser, response::ApiResponse};
use util::{config, state::AppState};

use db::error::AttendanceError;
use db::models::attendance_session::{Model as Session, NewAttendanceSession};
use db::models::scan_token::Model as Token;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionReq {
    #[validate(length(min = 1, max = 120, message = "unit_name must be 1-120 characters"))]
    pub unit_name: String,
    #[validate(regex(
        path = &*UNIT_CODE_RE,
        message = "unit_code must look like COS301"
    ))]
    pub unit_code: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[validate(length(min = 1, max = 120, message = "venue must be 1-120 characters"))]
    pub venue: String,
    pub capacity: Option<i32>,
    pub validity_minutes: Option<i64>,
    pub utc_offset_minutes: Option<i32>,
}

fn session_draft(body: &CreateSessionReq, owner: i64) -> Result<NewAttendanceSession, String> {
    let session_date = parse_session_date(&body.date)?;
    let start_time = parse_wall_time("start_time", &body.start_time)?;
    let end_time = parse_wall_time("end_time", &body.end_time)?;
    if end_time <= start_time {
        return Err("end_time must be after start_time".into());
    }

    let capacity = match body.capacity {
        Some(c) if c > 0 => c,
        _ => config::default_session_capacity(),
    };

    Ok(NewAttendanceSession {
        created_by: owner,
        unit_name: body.unit_name.clone(),
        unit_code: body.unit_code.clone(),
        venue: body.venue.clone(),
        session_date,
        start_time,
        end_time,
        utc_offset_minutes: body.utc_offset_minutes.unwrap_or(0),
        capacity,
    })
}

/// POST /api/sessions
///
/// Creates a session and its scan token in one durable step and returns the
/// QR credential payload. The caller becomes the session owner.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CreateSessionReq>,
) -> (StatusCode, Json<ApiResponse<QrPayload>>) {
    let db = state.db();

    if let Err(errors) = body.validate() {
        return attendance_error(AttendanceError::Validation(format_validation_errors(
            &errors,
        )));
    }

    let draft = match session_draft(&body, claims.sub) {
        Ok(draft) => draft,
        Err(msg) => return attendance_error(AttendanceError::Validation(msg)),
    };

    let validity_minutes = match body.validity_minutes {
        Some(v) if v <= 0 => {
            return attendance_error(AttendanceError::Validation(
                "validity_minutes must be positive".into(),
            ));
        }
        Some(v) => v,
        None => config::default_token_validity_minutes(),
    };

    match Session::issue(db, draft, validity_minutes, Utc::now()).await {
        Ok((session, token)) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                QrPayload::new(&session, &token),
                "Attendance session created",
            )),
        ),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}

/// POST /api/sessions/{session_id}/token
///
/// Returns the session's live token while it is still usable; only mints a
/// replacement once the current one is revoked, expired, or exhausted.
pub async fn reissue_token(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<QrPayload>>) {
    let db = state.db();

    let session = match Session::get_by_id(db, session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return attendance_error(AttendanceError::NotFound("session")),
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    if session.created_by != claims.sub && !claims.admin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Only the session owner may issue its token")),
        );
    }
    if !session.active {
        return attendance_error(AttendanceError::SessionUnavailable);
    }

    let validity_minutes = config::default_token_validity_minutes();
    match Token::issue_for_session(db, &session, validity_minutes, Utc::now()).await {
        Ok((token, reused)) => {
            let status = if reused {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            let message = if reused {
                "Existing token still valid"
            } else {
                "Token issued"
            };
            (
                status,
                Json(ApiResponse::success(
                    QrPayload::new(&session, &token),
                    message,
                )),
            )
        }
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}
