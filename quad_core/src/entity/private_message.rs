use crate::ids::{MessageId, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Directed sender -> recipient message. Hard-deleted in bulk when either
/// endpoint's account is removed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "private_message")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id"
    )]
    Sender,
}

impl ActiveModelBehavior for ActiveModel {}
