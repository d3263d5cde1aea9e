use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{DatabaseConnection, JoinType, QuerySelect, Set, TransactionTrait};
use serde::Serialize;

use super::attendance_session;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "scan_tokens")]
pub struct Model {
    /// Unguessable credential identity; never sequential.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub session_id: i64,
    /// The token is unusable at or after this instant.
    pub expires_at: DateTime<Utc>,
    /// Administrative kill switch, independent of expiry.
    pub active: bool,
    pub scan_count: i32,
    pub scan_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id"
    )]
    Session,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone)]
pub struct NewScanToken {
    pub session_id: i64,
    pub expires_at: DateTime<Utc>,
    pub scan_limit: i32,
}

/// Aggregate usage figures over all tokens issued by one owner's sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenUsageStats {
    pub total_issued: i64,
    pub active_unexpired: i64,
    pub total_scans: i64,
    pub mean_scans: f64,
}

/// Fresh credential identity: 32 random bytes, hex-encoded.
pub fn generate_id() -> String {
    use rand::RngCore;
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

impl Model {
    /// Stale-tolerant usability probe. The authoritative check is the WHERE
    /// clause of [`Model::consume`].
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now && self.scan_count < self.scan_limit
    }

    pub async fn get_by_id<C>(db: &C, id: &str) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn create<C>(db: &C, new: NewScanToken, now: DateTime<Utc>) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            id: Set(generate_id()),
            session_id: Set(new.session_id),
            expires_at: Set(new.expires_at),
            active: Set(true),
            scan_count: Set(0),
            scan_limit: Set(new.scan_limit),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
    }

    /// Returns the session's live token if it is still usable, otherwise
    /// mints a replacement and relinks the session to it.
    ///
    /// The boolean is true when the existing token was reused.
    pub async fn issue_for_session(
        db: &DatabaseConnection,
        session: &attendance_session::Model,
        validity_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<(Model, bool), DbErr> {
        if let Some(current) = &session.token_id {
            if let Some(token) = Model::get_by_id(db, current).await? {
                if token.is_usable(now) {
                    return Ok((token, true));
                }
            }
        }

        let txn = db.begin().await?;
        let token = Model::create(
            &txn,
            NewScanToken {
                session_id: session.id,
                expires_at: now + Duration::minutes(validity_minutes),
                scan_limit: session.capacity,
            },
            now,
        )
        .await?;

        let mut link: attendance_session::ActiveModel = session.clone().into();
        link.token_id = Set(Some(token.id.clone()));
        link.updated_at = Set(now);
        link.update(&txn).await?;

        txn.commit().await?;
        Ok((token, false))
    }

    /// Consumes one unit of scan budget, if any remains.
    ///
    /// A single conditional UPDATE: the WHERE clause re-checks the kill
    /// switch, expiry, and remaining budget, and `active` flips off in the
    /// same statement when this is the limiting scan. Racing callers cannot
    /// both take the last unit. Returns false when no budget was consumed.
    pub async fn consume<C>(db: &C, id: &str, now: DateTime<Utc>) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::update_many()
            .col_expr(Column::ScanCount, Expr::col(Column::ScanCount).add(1))
            .col_expr(Column::Active, Expr::cust("scan_count + 1 < scan_limit"))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Active.eq(true))
            .filter(Column::ExpiresAt.gt(now))
            .filter(Expr::col(Column::ScanCount).lt(Expr::col(Column::ScanLimit)))
            .exec(db)
            .await?;

        Ok(res.rows_affected == 1)
    }

    /// Expire-immediately revocation. Only touches a still-active token, so
    /// revoking twice is a no-op with identical resulting state.
    pub async fn revoke<C>(db: &C, id: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::update_many()
            .col_expr(Column::Active, Expr::value(false))
            .col_expr(Column::ExpiresAt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Active.eq(true))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Read-only aggregate over every token issued by `owner_id`'s sessions.
    pub async fn usage_stats<C>(
        db: &C,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TokenUsageStats, DbErr>
    where
        C: ConnectionTrait,
    {
        let tokens: Vec<Model> = Entity::find()
            .join(JoinType::InnerJoin, Relation::Session.def())
            .filter(attendance_session::Column::CreatedBy.eq(owner_id))
            .all(db)
            .await?;

        let total_issued = tokens.len() as i64;
        let active_unexpired = tokens
            .iter()
            .filter(|t| t.active && t.expires_at > now)
            .count() as i64;
        let total_scans: i64 = tokens.iter().map(|t| t.scan_count as i64).sum();
        let mean_scans = if total_issued == 0 {
            0.0
        } else {
            total_scans as f64 / total_issued as f64
        };

        Ok(TokenUsageStats {
            total_issued,
            active_unexpired,
            total_scans,
            mean_scans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_ids_are_long_and_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn usability_probe() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let token = Model {
            id: generate_id(),
            session_id: 1,
            expires_at: now + Duration::minutes(30),
            active: true,
            scan_count: 0,
            scan_limit: 2,
            created_at: now,
            updated_at: now,
        };
        assert!(token.is_usable(now));

        let expired = Model {
            expires_at: now,
            ..token.clone()
        };
        assert!(!expired.is_usable(now));

        let exhausted = Model {
            scan_count: 2,
            ..token.clone()
        };
        assert!(!exhausted.is_usable(now));

        let killed = Model {
            active: false,
            ..token
        };
        assert!(!killed.is_usable(now));
    }
}
