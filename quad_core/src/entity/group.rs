use crate::ids::{GroupId, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `member_count` is a denormalized cache of the membership rows for the
/// group. Every membership-mutating path recounts it inside the same
/// transaction, so it is always consistent at commit boundaries.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: GroupId,
    pub owner_id: UserId,
    pub name: String,
    pub is_private: bool,
    pub member_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::membership::Entity")]
    Membership,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
