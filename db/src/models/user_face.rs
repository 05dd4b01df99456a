use checkin::IdentityGallery;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::IntoActiveModel;
use serde::Serialize;

/// One enrolled face embedding per user, stored as a JSON array.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "user_faces")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    #[sea_orm(column_type = "Text")]
    pub embedding: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Enroll or re-enroll: a second registration overwrites the stored
    /// embedding.
    pub async fn register(
        db: &DatabaseConnection,
        user_id: i64,
        embedding: &[f64],
    ) -> Result<Self, DbErr> {
        let json = serde_json::to_string(embedding)
            .map_err(|e| DbErr::Custom(format!("Failed to encode embedding: {e}")))?;
        let now = Utc::now();

        match Entity::find_by_id(user_id).one(db).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.embedding = Set(json);
                active.updated_at = Set(now);
                active.update(db).await
            }
            None => {
                let face = ActiveModel {
                    user_id: Set(user_id),
                    embedding: Set(json),
                    updated_at: Set(now),
                };
                face.insert(db).await
            }
        }
    }

    pub async fn remove(db: &DatabaseConnection, user_id: i64) -> Result<bool, DbErr> {
        let res = Entity::delete_by_id(user_id).exec(db).await?;
        Ok(res.rows_affected > 0)
    }

    /// The stored embedding for one user, if enrolled.
    pub async fn embedding_for(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> Result<Option<Vec<f64>>, DbErr> {
        match Entity::find_by_id(user_id).one(db).await? {
            Some(face) => Ok(Some(face.decode()?)),
            None => Ok(None),
        }
    }

    /// Gallery of the given users' enrolled faces, preserving the order of
    /// `user_ids`. Users without an enrollment are simply absent.
    pub async fn gallery_for(
        db: &DatabaseConnection,
        user_ids: &[i64],
    ) -> Result<IdentityGallery, DbErr> {
        let rows = Entity::find()
            .filter(Column::UserId.is_in(user_ids.iter().copied()))
            .all(db)
            .await?;
        let mut by_id: std::collections::HashMap<i64, Vec<f64>> = std::collections::HashMap::new();
        for row in rows {
            let embedding = row.decode()?;
            by_id.insert(row.user_id, embedding);
        }

        let mut gallery = IdentityGallery::default();
        for id in user_ids {
            if let Some(embedding) = by_id.remove(id) {
                gallery.push(*id, embedding);
            }
        }
        Ok(gallery)
    }

    fn decode(&self) -> Result<Vec<f64>, DbErr> {
        serde_json::from_str(&self.embedding)
            .map_err(|e| DbErr::Custom(format!("Corrupt embedding for user {}: {e}", self.user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn register_overwrites_previous_embedding() {
        let db = setup_test_db().await;
        let u = user::Model::create(&db, "s1", "s1@example.com", "pw", false)
            .await
            .unwrap();

        Model::register(&db, u.id, &[1.0, 0.0]).await.unwrap();
        Model::register(&db, u.id, &[0.0, 1.0]).await.unwrap();

        let stored = Model::embedding_for(&db, u.id).await.unwrap();
        assert_eq!(stored, Some(vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn remove_clears_enrollment() {
        let db = setup_test_db().await;
        let u = user::Model::create(&db, "s1", "s1@example.com", "pw", false)
            .await
            .unwrap();
        Model::register(&db, u.id, &[1.0]).await.unwrap();

        assert!(Model::remove(&db, u.id).await.unwrap());
        assert!(!Model::remove(&db, u.id).await.unwrap());
        assert_eq!(Model::embedding_for(&db, u.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn gallery_follows_roster_order_and_skips_unenrolled() {
        let db = setup_test_db().await;
        let a = user::Model::create(&db, "a", "a@example.com", "pw", false)
            .await
            .unwrap();
        let b = user::Model::create(&db, "b", "b@example.com", "pw", false)
            .await
            .unwrap();
        let c = user::Model::create(&db, "c", "c@example.com", "pw", false)
            .await
            .unwrap();
        Model::register(&db, c.id, &[0.0, 1.0]).await.unwrap();
        Model::register(&db, a.id, &[1.0, 0.0]).await.unwrap();

        let gallery = Model::gallery_for(&db, &[a.id, b.id, c.id]).await.unwrap();
        let ids: Vec<i64> = gallery.iter().map(|e| e.subject_id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }
}
