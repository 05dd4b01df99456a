use checkin::{RecordStatus, Verdict};
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// One successful check-in. The composite primary key is the idempotence
/// guarantee: a (session, user) pair can hold at most one row, and absence
/// is never stored.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,

    pub status: Status,
    pub taken_at: DateTime<Utc>,

    pub similarity: Option<f64>,
    pub distance_m: Option<f64>,
    pub detected_gesture: Option<i32>,
    pub evidence_image_path: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_record_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Status {
    #[sea_orm(string_value = "checked")]
    Checked,
    #[sea_orm(string_value = "late")]
    Late,
}

impl From<RecordStatus> for Status {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Checked => Status::Checked,
            RecordStatus::Late => Status::Late,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Error)]
pub enum MarkError {
    #[error("attendance already recorded for this session")]
    AlreadyCheckedIn,
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl Model {
    /// Persist a verified attempt. Relies on the primary key for the
    /// race: if two submits pass the engine's fast check concurrently,
    /// the second insert fails and is reported as already checked in.
    pub async fn mark(
        db: &DatabaseConnection,
        session_id: i64,
        user_id: i64,
        verdict: &Verdict,
        taken_at: DateTime<Utc>,
        evidence_image_path: Option<String>,
    ) -> Result<Self, MarkError> {
        let record = ActiveModel {
            session_id: Set(session_id),
            user_id: Set(user_id),
            status: Set(verdict.status.into()),
            taken_at: Set(taken_at),
            similarity: Set(verdict.similarity),
            distance_m: Set(verdict.distance_m),
            detected_gesture: Set(verdict.detected_gesture.map(i32::from)),
            evidence_image_path: Set(evidence_image_path),
        };

        match record.insert(db).await {
            Ok(model) => Ok(model),
            Err(err) => {
                // Confirm it really was the uniqueness constraint before
                // reporting a duplicate.
                if Self::exists(db, session_id, user_id).await? {
                    Err(MarkError::AlreadyCheckedIn)
                } else {
                    Err(MarkError::Db(err))
                }
            }
        }
    }

    pub async fn exists(
        db: &DatabaseConnection,
        session_id: i64,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        Ok(Entity::find_by_id((session_id, user_id))
            .one(db)
            .await?
            .is_some())
    }

    pub async fn for_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .all(db)
            .await
    }

    pub async fn checked_count(db: &DatabaseConnection, session_id: i64) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .count(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{attendance_session, chat_group, user};
    use crate::test_utils::setup_test_db;
    use attendance_session::{CheckinMode, SessionParams};

    async fn session_fixture(db: &DatabaseConnection) -> (attendance_session::Model, i64) {
        let owner = user::Model::create(db, "owner", "o@example.com", "pw", false)
            .await
            .unwrap();
        let group = chat_group::Model::create(db, "COS 301", owner.id).await.unwrap();
        let session = attendance_session::Model::create(
            db,
            group.id,
            owner.id,
            "Lecture",
            CheckinMode::Code,
            SessionParams::default(),
            10,
            Utc::now(),
        )
        .await
        .unwrap();
        (session, owner.id)
    }

    fn verdict(status: RecordStatus) -> Verdict {
        Verdict {
            status,
            similarity: Some(91.25),
            distance_m: None,
            detected_gesture: Some(3),
        }
    }

    #[tokio::test]
    async fn mark_persists_evidence_fields() {
        let db = setup_test_db().await;
        let (session, uid) = session_fixture(&db).await;

        let record = Model::mark(
            &db,
            session.id,
            uid,
            &verdict(RecordStatus::Late),
            Utc::now(),
            Some("uploads/evidence/1_1.jpg".into()),
        )
        .await
        .unwrap();

        assert_eq!(record.status, Status::Late);
        assert_eq!(record.similarity, Some(91.25));
        assert_eq!(record.detected_gesture, Some(3));
        assert_eq!(
            record.evidence_image_path.as_deref(),
            Some("uploads/evidence/1_1.jpg")
        );
    }

    #[tokio::test]
    async fn double_mark_yields_exactly_one_record() {
        let db = setup_test_db().await;
        let (session, uid) = session_fixture(&db).await;

        Model::mark(&db, session.id, uid, &verdict(RecordStatus::Checked), Utc::now(), None)
            .await
            .unwrap();
        let second = Model::mark(
            &db,
            session.id,
            uid,
            &verdict(RecordStatus::Checked),
            Utc::now(),
            None,
        )
        .await;

        assert!(matches!(second, Err(MarkError::AlreadyCheckedIn)));
        assert_eq!(Model::checked_count(&db, session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_session() {
        let db = setup_test_db().await;
        let (session, uid) = session_fixture(&db).await;
        let other = attendance_session::Model::create(
            &db,
            session.group_id,
            uid,
            "Other",
            CheckinMode::Code,
            SessionParams::default(),
            10,
            Utc::now(),
        )
        .await
        .unwrap();

        Model::mark(&db, session.id, uid, &verdict(RecordStatus::Checked), Utc::now(), None)
            .await
            .unwrap();

        assert_eq!(Model::for_session(&db, session.id).await.unwrap().len(), 1);
        assert!(Model::for_session(&db, other.id).await.unwrap().is_empty());
        assert!(Model::exists(&db, session.id, uid).await.unwrap());
        assert!(!Model::exists(&db, other.id, uid).await.unwrap());
    }
}
