use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::group_member::{self, MemberRole};

/// A chat group doubles as the attendance roster: check-in sessions are
/// scoped to one group and "absent" means a member with no record.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "chat_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::group_member::Entity")]
    Members,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Create a group and enroll the owner as its first member.
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        owner_id: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let group = ActiveModel {
            name: Set(name.to_owned()),
            owner_id: Set(owner_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let group = group.insert(db).await?;
        group_member::Model::add(db, group.id, owner_id, MemberRole::Owner).await?;
        Ok(group)
    }
}
