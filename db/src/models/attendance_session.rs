use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::scan_token;
use crate::models::attendance_record::AttendanceStatus;

/// Scans are accepted from this many minutes before the scheduled start...
pub const SCAN_WINDOW_OPENS_BEFORE_MIN: i64 = 30;
/// ...until this many minutes after the scheduled end (both ends inclusive).
pub const SCAN_WINDOW_CLOSES_AFTER_MIN: i64 = 15;
/// Scans later than start + this threshold classify as late.
pub const LATE_AFTER_MIN: i64 = 15;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Issuing lecturer; immutable after creation.
    pub created_by: i64,
    pub unit_name: String,
    pub unit_code: String,
    pub venue: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Offset of the schedule's wall-clock fields from UTC, in minutes.
    pub utc_offset_minutes: i32,
    pub capacity: i32,
    pub status: SessionStatus,
    /// Accepted-scan total; only ever bumped by an atomic store-side increment.
    pub attendance_count: i32,
    pub active: bool,
    /// Live scannable token, at most one at a time.
    pub token_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "ongoing")]
    Ongoing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::scan_token::Entity")]
    Tokens,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::scan_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tokens.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Draft fields for a new session, as supplied by the issuance flow.
#[derive(Debug, Clone)]
pub struct NewAttendanceSession {
    pub created_by: i64,
    pub unit_name: String,
    pub unit_code: String,
    pub venue: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub utc_offset_minutes: i32,
    pub capacity: i32,
}

impl Model {
    /// Scheduled start as a UTC instant.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.session_date.and_time(self.start_time).and_utc()
            - Duration::minutes(self.utc_offset_minutes as i64)
    }

    /// Scheduled end as a UTC instant.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.session_date.and_time(self.end_time).and_utc()
            - Duration::minutes(self.utc_offset_minutes as i64)
    }

    /// The inclusive range of instants during which a scan may be accepted.
    pub fn scan_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.starts_at() - Duration::minutes(SCAN_WINDOW_OPENS_BEFORE_MIN),
            self.ends_at() + Duration::minutes(SCAN_WINDOW_CLOSES_AFTER_MIN),
        )
    }

    pub fn in_scan_window(&self, at: DateTime<Utc>) -> bool {
        let (opens, closes) = self.scan_window();
        at >= opens && at <= closes
    }

    /// Classifies a scan instant against the schedule.
    ///
    /// Past the scheduled end the scan is still recordable (the window stays
    /// open a little longer) but counts as absent.
    pub fn classify(&self, scanned_at: DateTime<Utc>) -> AttendanceStatus {
        if scanned_at > self.ends_at() {
            AttendanceStatus::Absent
        } else if scanned_at > self.starts_at() + Duration::minutes(LATE_AFTER_MIN) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }

    pub async fn get_by_id<C>(db: &C, id: i64) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id).one(db).await
    }

    /// Creates the session row itself. Most callers want [`Model::issue`],
    /// which also mints the linked scan token.
    pub async fn create<C>(db: &C, draft: NewAttendanceSession, now: DateTime<Utc>) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            created_by: Set(draft.created_by),
            unit_name: Set(draft.unit_name),
            unit_code: Set(draft.unit_code),
            venue: Set(draft.venue),
            session_date: Set(draft.session_date),
            start_time: Set(draft.start_time),
            end_time: Set(draft.end_time),
            utc_offset_minutes: Set(draft.utc_offset_minutes),
            capacity: Set(draft.capacity),
            status: Set(SessionStatus::Ongoing),
            attendance_count: Set(0),
            active: Set(true),
            token_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Creates a session together with its scan token and links the two, all
    /// in one transaction so no session-without-token state can be observed.
    ///
    /// The token inherits the session capacity as its scan budget and expires
    /// `validity_minutes` after `now`.
    pub async fn issue(
        db: &DatabaseConnection,
        draft: NewAttendanceSession,
        validity_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<(Model, scan_token::Model), DbErr> {
        let txn = db.begin().await?;

        let session = Model::create(&txn, draft, now).await?;
        let token = scan_token::Model::create(
            &txn,
            scan_token::NewScanToken {
                session_id: session.id,
                expires_at: now + Duration::minutes(validity_minutes),
                scan_limit: session.capacity,
            },
            now,
        )
        .await?;

        let mut link: ActiveModel = session.into();
        link.token_id = Set(Some(token.id.clone()));
        link.updated_at = Set(now);
        let session = link.update(&txn).await?;

        txn.commit().await?;
        Ok((session, token))
    }

    /// Atomic store-side bump of the aggregate counter.
    pub async fn increment_attendance<C>(db: &C, id: i64) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::update_many()
            .col_expr(
                Column::AttendanceCount,
                Expr::col(Column::AttendanceCount).add(1),
            )
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }
}
