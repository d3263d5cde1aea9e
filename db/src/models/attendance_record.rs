use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AttendanceError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub student_id: i64,
    /// Which credential admitted this entry.
    pub token_id: String,
    pub scanned_at: DateTime<Utc>,
    /// Classification computed at recording time; never rewritten.
    pub status: AttendanceStatus,
    /// Administrative correction, kept apart from the computed status.
    pub status_override: Option<AttendanceStatus>,
    pub overridden_by: Option<i64>,
    pub ip_address: Option<String>,
    pub device: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "excused")]
    Excused,
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

impl Model {
    /// The status reports should use: the administrative override when one
    /// exists, otherwise the computed classification.
    pub fn effective_status(&self) -> AttendanceStatus {
        self.status_override.unwrap_or(self.status)
    }

    /// Duplicate probe for one (session, student) pair.
    pub async fn find_for<C>(
        db: &C,
        session_id: i64,
        student_id: i64,
    ) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::StudentId.eq(student_id))
            .one(db)
            .await
    }

    pub async fn get_by_id<C>(db: &C, id: i64) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn list_for_session<C>(db: &C, session_id: i64) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .all(db)
            .await
    }

    /// Records an administrative reclassification, preserving the computed
    /// status and who made the correction.
    pub async fn override_status<C>(
        db: &C,
        id: i64,
        status: AttendanceStatus,
        overridden_by: i64,
    ) -> Result<Model, AttendanceError>
    where
        C: ConnectionTrait,
    {
        let record = Model::get_by_id(db, id)
            .await?
            .ok_or(AttendanceError::NotFound("attendance record"))?;

        let mut active: ActiveModel = record.into();
        active.status_override = Set(Some(status));
        active.overridden_by = Set(Some(overridden_by));
        let updated = active.update(db).await?;
        Ok(updated)
    }
}
