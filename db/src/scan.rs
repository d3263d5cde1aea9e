//! The scan pipeline: validation of a presented token and durable recording
//! of the resulting attendance entry.
//!
//! `validate` is a mutation-free pre-check for early rejection and fast user
//! feedback; its reads are stale-tolerant. The authoritative admission
//! decision is `record`, whose transaction couples the conditional budget
//! increment with the uniqueness-constrained entry insert, so neither
//! over-admission nor duplicate entries can slip through a race.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, SqlErr, TransactionTrait};

use crate::error::AttendanceError;
use crate::models::{attendance_record, attendance_session, scan_token};

/// Resolved snapshots handed from a successful validation to the recorder.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub session: attendance_session::Model,
    pub token: scan_token::Model,
}

/// One student's scan submission.
#[derive(Debug, Clone)]
pub struct ScanAttempt {
    pub student_id: i64,
    pub scanned_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub device: Option<String>,
}

/// Decides whether a scan may proceed. Checks run in order and short-circuit:
/// token usable, session available, no prior entry, inside the scan window.
///
/// The duplicate probe runs before any budget is touched, so a duplicate
/// rejection never costs the token a scan.
pub async fn validate(
    db: &DatabaseConnection,
    token_id: &str,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<ScanContext, AttendanceError> {
    let token = scan_token::Model::get_by_id(db, token_id)
        .await?
        .filter(|t| t.is_usable(now))
        .ok_or(AttendanceError::TokenUnusable)?;

    let session = attendance_session::Model::get_by_id(db, token.session_id)
        .await?
        .filter(|s| s.active)
        .ok_or(AttendanceError::SessionUnavailable)?;

    if attendance_record::Model::find_for(db, session.id, student_id)
        .await?
        .is_some()
    {
        return Err(AttendanceError::AlreadyRecorded);
    }

    if !session.in_scan_window(now) {
        return Err(AttendanceError::OutsideScanWindow);
    }

    Ok(ScanContext { session, token })
}

/// Commits an accepted scan: classifies it, consumes one unit of token
/// budget, inserts the entry, and bumps the session aggregate — all in one
/// transaction, each mutation atomic at the store.
///
/// The snapshots in `ctx` may be stale; the conditional UPDATE inside
/// re-checks the token against `attempt.scanned_at` and the unique index
/// arbitrates duplicate races. A losing duplicate rolls the whole
/// transaction back, budget included.
pub async fn record(
    db: &DatabaseConnection,
    ctx: &ScanContext,
    attempt: ScanAttempt,
) -> Result<attendance_record::Model, AttendanceError> {
    let status = ctx.session.classify(attempt.scanned_at);

    let txn = db.begin().await?;

    if !scan_token::Model::consume(&txn, &ctx.token.id, attempt.scanned_at).await? {
        txn.rollback().await?;
        tracing::debug!(token = %ctx.token.id, "scan budget refused");
        return Err(AttendanceError::TokenUnusable);
    }

    let inserted = attendance_record::ActiveModel {
        session_id: Set(ctx.session.id),
        student_id: Set(attempt.student_id),
        token_id: Set(ctx.token.id.clone()),
        scanned_at: Set(attempt.scanned_at),
        status: Set(status),
        status_override: Set(None),
        overridden_by: Set(None),
        ip_address: Set(attempt.ip_address),
        device: Set(attempt.device),
        verified: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await;

    let entry = match inserted {
        Ok(entry) => entry,
        Err(err) => {
            let duplicate = matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)));
            txn.rollback().await?;
            return Err(if duplicate {
                AttendanceError::AlreadyRecorded
            } else {
                AttendanceError::Db(err)
            });
        }
    };

    attendance_session::Model::increment_attendance(&txn, ctx.session.id).await?;

    txn.commit().await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance_record::AttendanceStatus;
    use crate::models::attendance_session::{Model as Session, NewAttendanceSession};
    use crate::models::scan_token::Model as Token;
    use crate::test_utils::setup_test_db;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use futures::future::join_all;

    fn draft_0900_1000(capacity: i32) -> NewAttendanceSession {
        NewAttendanceSession {
            created_by: 7,
            unit_name: "Software Engineering".into(),
            unit_code: "COS301".into(),
            venue: "IT 4-1".into(),
            session_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            utc_offset_minutes: 0,
            capacity,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    async fn scan(
        db: &DatabaseConnection,
        token_id: &str,
        student_id: i64,
        when: DateTime<Utc>,
    ) -> Result<attendance_record::Model, AttendanceError> {
        let ctx = validate(db, token_id, student_id, when).await?;
        record(
            db,
            &ctx,
            ScanAttempt {
                student_id,
                scanned_at: when,
                ip_address: None,
                device: None,
            },
        )
        .await
    }

    #[tokio::test]
    async fn issue_scan_lifecycle() {
        let db = setup_test_db().await;
        let issued_at = at(8, 55, 0);
        let (session, token) = Session::issue(&db, draft_0900_1000(2), 60, issued_at)
            .await
            .unwrap();
        assert_eq!(session.token_id.as_deref(), Some(token.id.as_str()));
        assert_eq!(token.scan_limit, 2);

        // A scans on time
        let entry = scan(&db, &token.id, 101, at(9, 0, 0)).await.unwrap();
        assert_eq!(entry.status, AttendanceStatus::Present);
        let token_now = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert_eq!(token_now.scan_count, 1);
        assert!(token_now.active);

        // A scans again: duplicate, and the budget is untouched
        let err = scan(&db, &token.id, 101, at(9, 2, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyRecorded));
        assert_eq!(err.to_string(), "already recorded");
        let token_now = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert_eq!(token_now.scan_count, 1);

        // B scans past the late threshold: admitted as late, budget exhausted
        let entry = scan(&db, &token.id, 102, at(9, 16, 0)).await.unwrap();
        assert_eq!(entry.status, AttendanceStatus::Late);
        let token_now = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert_eq!(token_now.scan_count, 2);
        assert!(!token_now.active);

        // C finds the token exhausted
        let err = scan(&db, &token.id, 103, at(9, 20, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::TokenUnusable));
        assert_eq!(err.to_string(), "invalid, expired, or exhausted");

        let session_now = Session::get_by_id(&db, session.id).await.unwrap().unwrap();
        assert_eq!(session_now.attendance_count, 2);
    }

    #[tokio::test]
    async fn scan_window_edges() {
        let db = setup_test_db().await;
        let (_, token) = Session::issue(&db, draft_0900_1000(50), 180, at(8, 0, 0))
            .await
            .unwrap();

        // one second before the window opens
        let err = scan(&db, &token.id, 201, at(8, 29, 59)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::OutsideScanWindow));
        assert_eq!(err.to_string(), "outside lecture scan window");

        // exactly at the open edge
        scan(&db, &token.id, 201, at(8, 30, 0)).await.unwrap();

        // exactly at the close edge (classified absent, but admitted)
        let entry = scan(&db, &token.id, 202, at(10, 15, 0)).await.unwrap();
        assert_eq!(entry.status, AttendanceStatus::Absent);

        // one second past the close edge
        let err = scan(&db, &token.id, 203, at(10, 15, 1)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::OutsideScanWindow));
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let db = setup_test_db().await;
        let (_, token) = Session::issue(&db, draft_0900_1000(50), 10, at(8, 55, 0))
            .await
            .unwrap();

        let err = scan(&db, &token.id, 301, at(9, 30, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::TokenUnusable));
    }

    #[tokio::test]
    async fn deactivated_session_rejected() {
        let db = setup_test_db().await;
        let (session, token) = Session::issue(&db, draft_0900_1000(50), 60, at(8, 55, 0))
            .await
            .unwrap();

        let mut active: crate::models::attendance_session::ActiveModel = session.into();
        active.active = Set(false);
        active.update(&db).await.unwrap();

        let err = scan(&db, &token.id, 401, at(9, 0, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::SessionUnavailable));
        assert_eq!(err.to_string(), "session unavailable");
    }

    #[tokio::test]
    async fn concurrent_scans_never_exceed_budget() {
        let db = setup_test_db().await;
        let (_, token) = Session::issue(&db, draft_0900_1000(2), 60, at(8, 55, 0))
            .await
            .unwrap();
        let when = at(9, 1, 0);

        // All four pass the stale-tolerant pre-check before anyone commits.
        let mut contexts = Vec::new();
        for student in [501, 502, 503, 504] {
            contexts.push((student, validate(&db, &token.id, student, when).await.unwrap()));
        }

        let results = join_all(contexts.iter().map(|(student, ctx)| {
            record(
                &db,
                ctx,
                ScanAttempt {
                    student_id: *student,
                    scanned_at: when,
                    ip_address: None,
                    device: None,
                },
            )
        }))
        .await;

        let admitted = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(AttendanceError::TokenUnusable)))
            .count();
        assert_eq!(admitted, 2);
        assert_eq!(refused, 2);

        let token_now = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert_eq!(token_now.scan_count, 2);
        assert!(!token_now.active);
    }

    #[tokio::test]
    async fn concurrent_duplicates_admit_exactly_one() {
        let db = setup_test_db().await;
        let (session, token) = Session::issue(&db, draft_0900_1000(50), 60, at(8, 55, 0))
            .await
            .unwrap();
        let when = at(9, 1, 0);

        // Both attempts hold an accepted validation for the same student.
        let ctx_a = validate(&db, &token.id, 601, when).await.unwrap();
        let ctx_b = ctx_a.clone();

        let db_ref = &db;
        let attempt = |ctx: ScanContext| async move {
            record(
                db_ref,
                &ctx,
                ScanAttempt {
                    student_id: 601,
                    scanned_at: when,
                    ip_address: None,
                    device: None,
                },
            )
            .await
        };
        let results = join_all([attempt(ctx_a), attempt(ctx_b)]).await;

        let admitted = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(AttendanceError::AlreadyRecorded)))
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(duplicates, 1);

        // The loser's rollback returned its budget unit.
        let token_now = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert_eq!(token_now.scan_count, 1);
        let session_now = Session::get_by_id(&db, session.id).await.unwrap().unwrap();
        assert_eq!(session_now.attendance_count, 1);
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let db = setup_test_db().await;
        let (_, token) = Session::issue(&db, draft_0900_1000(50), 60, at(8, 55, 0))
            .await
            .unwrap();

        let revoked_at = at(9, 5, 0);
        Token::revoke(&db, &token.id, revoked_at).await.unwrap();
        let first = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert!(!first.active);
        assert_eq!(first.expires_at, revoked_at);

        // Second revocation later leaves the state byte-for-byte identical.
        Token::revoke(&db, &token.id, at(9, 30, 0)).await.unwrap();
        let second = Token::get_by_id(&db, &token.id).await.unwrap().unwrap();
        assert_eq!(first, second);

        let err = scan(&db, &token.id, 701, at(9, 6, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::TokenUnusable));
    }

    #[tokio::test]
    async fn reissue_returns_live_token_until_unusable() {
        let db = setup_test_db().await;
        let issued_at = at(8, 55, 0);
        let (session, token) = Session::issue(&db, draft_0900_1000(50), 60, issued_at)
            .await
            .unwrap();

        let (same, reused) = Token::issue_for_session(&db, &session, 60, at(9, 0, 0))
            .await
            .unwrap();
        assert!(reused);
        assert_eq!(same.id, token.id);

        Token::revoke(&db, &token.id, at(9, 5, 0)).await.unwrap();
        let session = Session::get_by_id(&db, session.id).await.unwrap().unwrap();
        let (fresh, reused) = Token::issue_for_session(&db, &session, 60, at(9, 6, 0))
            .await
            .unwrap();
        assert!(!reused);
        assert_ne!(fresh.id, token.id);

        let session_now = Session::get_by_id(&db, session.id).await.unwrap().unwrap();
        assert_eq!(session_now.token_id.as_deref(), Some(fresh.id.as_str()));
    }

    #[tokio::test]
    async fn usage_stats_aggregate_per_owner() {
        let db = setup_test_db().await;
        let now = at(8, 55, 0);
        let (_, token_a) = Session::issue(&db, draft_0900_1000(2), 60, now).await.unwrap();

        let mut other = draft_0900_1000(50);
        other.created_by = 8;
        Session::issue(&db, other, 60, now).await.unwrap();

        scan(&db, &token_a.id, 801, at(9, 0, 0)).await.unwrap();
        scan(&db, &token_a.id, 802, at(9, 1, 0)).await.unwrap();

        let stats = Token::usage_stats(&db, 7, at(9, 10, 0)).await.unwrap();
        assert_eq!(stats.total_issued, 1);
        // exhausted by the second scan, so no longer active
        assert_eq!(stats.active_unexpired, 0);
        assert_eq!(stats.total_scans, 2);
        assert!((stats.mean_scans - 2.0).abs() < f64::EPSILON);

        let stats = Token::usage_stats(&db, 8, at(9, 10, 0)).await.unwrap();
        assert_eq!(stats.total_issued, 1);
        assert_eq!(stats.active_unexpired, 1);
        assert_eq!(stats.total_scans, 0);
        assert!(stats.mean_scans.abs() < f64::EPSILON);
    }
}
