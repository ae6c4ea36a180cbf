// SeaORM entities
// One module per table; `prelude` re-exports everything the service
// layer needs under aliased names.

pub mod comment;
pub mod group;
pub mod membership;
pub mod post;
pub mod post_like;
pub mod private_message;
pub mod user;


pub mod prelude {
    // Re-export all entities for convenience
    pub use super::comment::{
        ActiveModel as CommentActiveModel, Column as CommentColumn, Entity as Comment,
        Model as CommentModel,
    };
    pub use super::group::{
        ActiveModel as GroupActiveModel, Column as GroupColumn, Entity as Group,
        Model as GroupModel,
    };
    pub use super::membership::{
        ActiveModel as MembershipActiveModel, Column as MembershipColumn, Entity as Membership,
        Model as MembershipModel,
    };
    pub use super::post::{
        ActiveModel as PostActiveModel, Column as PostColumn, Entity as Post, Model as PostModel,
    };
    pub use super::post_like::{
        ActiveModel as PostLikeActiveModel, Column as PostLikeColumn, Entity as PostLike,
        Model as PostLikeModel,
    };
    pub use super::private_message::{
        ActiveModel as PrivateMessageActiveModel, Column as PrivateMessageColumn,
        Entity as PrivateMessage, Model as PrivateMessageModel,
    };
    pub use super::user::{
        ActiveModel as UserActiveModel, Column as UserColumn, Entity as User, Model as UserModel,
        Role,
    };

    // Re-export commonly used SeaORM types and traits
    pub use sea_orm::{
        ActiveModelTrait,
        ActiveValue,

        ColumnTrait,
        ConnectionTrait,

        // Database and connection types
        Database,
        DatabaseConnection,
        DbConn,
        // Common result types
        DbErr,
        Delete,

        // Core traits
        EntityTrait,
        Insert,
        ModelTrait,
        NotSet,
        PaginatorTrait,
        QueryFilter,
        QueryOrder,
        QuerySelect,
        Related,
        RelationTrait,
        // Query builders
        Select,
        // Active model helpers
        Set,

        Unchanged,
        Update,
    };
}
