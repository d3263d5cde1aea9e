use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::routes::common::attendance_error;
use crate::{auth::AuthUser, response::ApiResponse};
use util::state::AppState;

use db::error::AttendanceError;
use db::models::attendance_session::Model as Session;
use db::models::scan_token::Model as Token;

/// DELETE /api/tokens/{token_id}
///
/// Expire-immediately revocation. Idempotent: revoking an already-inactive
/// or unknown token reports success without touching anything.
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let db = state.db();

    let token = match Token::get_by_id(db, &token_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            return (
                StatusCode::OK,
                Json(ApiResponse::success((), "Token revoked")),
            );
        }
        Err(e) => return attendance_error(AttendanceError::Db(e)),
    };

    if let Ok(Some(session)) = Session::get_by_id(db, token.session_id).await {
        if session.created_by != claims.sub && !claims.admin {
            return (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::error("Only the session owner may revoke its token")),
            );
        }
    }

    match Token::revoke(db, &token_id, Utc::now()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Token revoked")),
        ),
        Err(e) => attendance_error(AttendanceError::Db(e)),
    }
}
