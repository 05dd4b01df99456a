use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Membership of a user in a chat group.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,

    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "group_member_role")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MemberRole {
    #[sea_orm(string_value = "owner")]
    Owner,
    #[sea_orm(string_value = "member")]
    Member,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat_group::Entity",
        from = "Column::GroupId",
        to = "super::chat_group::Column::Id",
        on_delete = "Cascade"
    )]
    Group,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::chat_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn add(
        db: &DatabaseConnection,
        group_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<Self, DbErr> {
        let member = ActiveModel {
            group_id: Set(group_id),
            user_id: Set(user_id),
            role: Set(role),
            joined_at: Set(Utc::now()),
        };
        member.insert(db).await
    }

    pub async fn is_member(
        db: &DatabaseConnection,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        Ok(Entity::find_by_id((group_id, user_id)).one(db).await?.is_some())
    }

    /// The roster: every member's user id, in join order.
    pub async fn member_ids(db: &DatabaseConnection, group_id: i64) -> Result<Vec<i64>, DbErr> {
        let members = Entity::find()
            .filter(Column::GroupId.eq(group_id))
            .all(db)
            .await?;
        Ok(members.into_iter().map(|m| m.user_id).collect())
    }

    /// Group ids the user belongs to, for scoping session lists.
    pub async fn group_ids_for(db: &DatabaseConnection, user_id: i64) -> Result<Vec<i64>, DbErr> {
        let rows = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.group_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{chat_group, user};
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn roster_includes_owner_and_members() {
        let db = setup_test_db().await;
        let owner = user::Model::create(&db, "owner", "o@example.com", "pw", false)
            .await
            .unwrap();
        let student = user::Model::create(&db, "student", "s@example.com", "pw", false)
            .await
            .unwrap();
        let group = chat_group::Model::create(&db, "COS 301", owner.id).await.unwrap();
        Model::add(&db, group.id, student.id, MemberRole::Member)
            .await
            .unwrap();

        let roster = Model::member_ids(&db, group.id).await.unwrap();
        assert_eq!(roster, vec![owner.id, student.id]);
        assert!(Model::is_member(&db, group.id, student.id).await.unwrap());
        assert!(!Model::is_member(&db, group.id, 9999).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_membership_is_rejected() {
        let db = setup_test_db().await;
        let owner = user::Model::create(&db, "owner", "o@example.com", "pw", false)
            .await
            .unwrap();
        let group = chat_group::Model::create(&db, "COS 301", owner.id).await.unwrap();

        let dup = Model::add(&db, group.id, owner.id, MemberRole::Member).await;
        assert!(dup.is_err());
    }
}
