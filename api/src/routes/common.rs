//! Shared DTOs and helpers for the route handlers.

use axum::{Json, http::StatusCode};
use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use validator::ValidationErrors;

use crate::response::ApiResponse;
use db::error::AttendanceError;
use db::models::{attendance_record, attendance_session, scan_token};

lazy_static! {
    /// Unit codes look like "COS301": a letter prefix and a numeric tail.
    pub static ref UNIT_CODE_RE: Regex = Regex::new(r"^[A-Za-z]{2,8}[0-9]{2,4}$").unwrap();
}

/// Flattens `validator` output into a single readable message.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| {
            errs.iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn parse_session_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

pub fn parse_wall_time(field: &str, value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| format!("invalid {field} '{value}', expected HH:MM"))
}

/// Maps a core error to the transport's status classes. Store faults are
/// logged and masked; rejections surface their stable reason string.
pub fn attendance_error<T>(err: AttendanceError) -> (StatusCode, Json<ApiResponse<T>>)
where
    T: Serialize + Default,
{
    let status = match &err {
        AttendanceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
        AttendanceError::AlreadyRecorded => StatusCode::CONFLICT,
        AttendanceError::TokenUnusable
        | AttendanceError::SessionUnavailable
        | AttendanceError::OutsideScanWindow => StatusCode::BAD_REQUEST,
        AttendanceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if let AttendanceError::Db(e) = &err {
        tracing::error!(error = %e, "attendance store failure");
        return (status, Json(ApiResponse::error("Internal server error")));
    }
    (status, Json(ApiResponse::error(err.to_string())))
}

/// The credential payload handed to the QR renderer: everything a scanning
/// client needs to admit itself and display the lecture.
#[derive(Debug, Serialize, Default)]
pub struct QrPayload {
    pub session_id: i64,
    pub token_id: String,
    pub expires_at: String,
    pub unit_name: String,
    pub unit_code: String,
    pub venue: String,
    pub session_date: String,
    pub start_time: String,
    pub end_time: String,
}

impl QrPayload {
    pub fn new(session: &attendance_session::Model, token: &scan_token::Model) -> Self {
        Self {
            session_id: session.id,
            token_id: token.id.clone(),
            expires_at: token.expires_at.to_rfc3339(),
            unit_name: session.unit_name.clone(),
            unit_code: session.unit_code.clone(),
            venue: session.venue.clone(),
            session_date: session.session_date.format("%Y-%m-%d").to_string(),
            start_time: session.start_time.format("%H:%M").to_string(),
            end_time: session.end_time.format("%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct SessionResponse {
    pub id: i64,
    pub created_by: i64,
    pub unit_name: String,
    pub unit_code: String,
    pub venue: String,
    pub session_date: String,
    pub start_time: String,
    pub end_time: String,
    pub utc_offset_minutes: i32,
    pub capacity: i32,
    pub status: String,
    pub attendance_count: i32,
    pub active: bool,
    pub token_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<attendance_session::Model> for SessionResponse {
    fn from(m: attendance_session::Model) -> Self {
        Self {
            id: m.id,
            created_by: m.created_by,
            unit_name: m.unit_name,
            unit_code: m.unit_code,
            venue: m.venue,
            session_date: m.session_date.format("%Y-%m-%d").to_string(),
            start_time: m.start_time.format("%H:%M").to_string(),
            end_time: m.end_time.format("%H:%M").to_string(),
            utc_offset_minutes: m.utc_offset_minutes,
            capacity: m.capacity,
            status: m.status.to_string(),
            attendance_count: m.attendance_count,
            active: m.active,
            token_id: m.token_id,
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
        }
    }
}

/// Denormalized receipt returned to the scanning student; no further lookup
/// is needed for display.
#[derive(Debug, Serialize, Default)]
pub struct ScanReceipt {
    pub attendance_id: i64,
    pub status: String,
    pub scanned_at: String,
    pub unit_name: String,
    pub unit_code: String,
    pub venue: String,
    pub session_date: String,
    pub start_time: String,
    pub end_time: String,
}

impl ScanReceipt {
    pub fn new(entry: &attendance_record::Model, session: &attendance_session::Model) -> Self {
        Self {
            attendance_id: entry.id,
            status: entry.status.to_string(),
            scanned_at: entry.scanned_at.to_rfc3339(),
            unit_name: session.unit_name.clone(),
            unit_code: session.unit_code.clone(),
            venue: session.venue.clone(),
            session_date: session.session_date.format("%Y-%m-%d").to_string(),
            start_time: session.start_time.format("%H:%M").to_string(),
            end_time: session.end_time.format("%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct AttendanceRecordResponse {
    pub id: i64,
    pub session_id: i64,
    pub student_id: i64,
    pub token_id: String,
    pub scanned_at: String,
    pub status: String,
    pub status_override: Option<String>,
    pub overridden_by: Option<i64>,
    pub effective_status: String,
    pub ip_address: Option<String>,
    pub device: Option<String>,
    pub verified: bool,
}

impl From<attendance_record::Model> for AttendanceRecordResponse {
    fn from(m: attendance_record::Model) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            student_id: m.student_id,
            token_id: m.token_id.clone(),
            scanned_at: m.scanned_at.to_rfc3339(),
            status: m.status.to_string(),
            status_override: m.status_override.map(|s| s.to_string()),
            overridden_by: m.overridden_by,
            effective_status: m.effective_status().to_string(),
            ip_address: m.ip_address,
            device: m.device,
            verified: m.verified,
        }
    }
}
