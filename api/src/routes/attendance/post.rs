use axum::{
    Extension, Json,
    extract::{ConnectInfo, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::routes::common::{ScanReceipt, attendance_error};
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::scan::{self, ScanAttempt};

#[derive(Debug, Deserialize)]
pub struct ScanReq {
    pub token: String,
    /// Capture instant; defaults to processing time.
    pub scanned_at: Option<DateTime<Utc>>,
    pub device: Option<String>,
}

/// POST /api/attendance/scan
///
/// Validates the presented token for the authenticated student and, on
/// acceptance, durably records the attendance entry. The validation here is
/// a fast pre-check; admission is decided by the recorder's transaction.
pub async fn scan_attendance(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<ScanReq>,
) -> (StatusCode, Json<ApiResponse<ScanReceipt>>) {
    let db = state.db();
    let now = Utc::now();
    let scanned_at = body.scanned_at.unwrap_or(now);

    let ctx = match scan::validate(db, &body.token, claims.sub, now).await {
        Ok(ctx) => ctx,
        Err(e) => return attendance_error(e),
    };

    let attempt = ScanAttempt {
        student_id: claims.sub,
        scanned_at,
        ip_address: Some(addr.ip().to_string()),
        device: body.device,
    };

    match scan::record(db, &ctx, attempt).await {
        Ok(entry) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                ScanReceipt::new(&entry, &ctx.session),
                "Attendance recorded",
            )),
        ),
        Err(e) => attendance_error(e),
    }
}
