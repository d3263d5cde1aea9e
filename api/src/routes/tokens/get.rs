use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::routes::common::attendance_error;
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::error::AttendanceError;
use db::models::scan_token::{Model as Token, TokenUsageStats};

/// GET /api/tokens/stats
///
/// Aggregate usage over every token issued by the caller's sessions.
pub async fn usage_stats(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<TokenUsageStats>>) {
    match Token::usage_stats(state.db(), claims.sub, Utc::now()).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(ApiResponse::success(stats, "Token usage statistics")),
        ),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}
