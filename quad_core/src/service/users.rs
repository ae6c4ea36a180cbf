use sea_orm::{sea_query::Expr, DatabaseConnection, TransactionTrait};
use thiserror::Error;

use crate::{
    entity::prelude::*,
    ids::UserId,
    service::{
        groups::{recount_members, resolve_owner_removal},
        now_rfc3339,
    },
};

#[derive(Debug, Error)]
pub enum UsersServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("unauthorized: acting user is not an active admin")]
    Unauthorized,

    #[error("admin accounts cannot be deleted")]
    CannotDeleteAdmin,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[derive(Clone)]
pub struct UsersService {
    db: DatabaseConnection,
}

impl UsersService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new active user account
    pub async fn create_user(
        &self,
        name: String,
        email: String,
        role: Role,
    ) -> Result<UserModel, UsersServiceError> {
        if name.trim().is_empty() {
            return Err(UsersServiceError::InvalidInput(
                "name must not be empty".to_string(),
            ));
        }
        if !looks_like_email(&email) {
            return Err(UsersServiceError::InvalidInput(format!(
                "not a valid email address: {email}"
            )));
        }

        let now = now_rfc3339();
        let user = UserActiveModel {
            id: Set(UserId::new()),
            name: Set(name),
            email: Set(email),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let created = User::insert(user).exec_with_returning(&self.db).await?;
        Ok(created)
    }

    /// Get a specific user by ID
    pub async fn get_user(&self, user_id: UserId) -> Result<UserModel, UsersServiceError> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(UsersServiceError::UserNotFound)
    }

    /// List users with pagination, oldest account first
    pub async fn list_users(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<UserModel>, UsersServiceError> {
        let users = User::find()
            .order_by_asc(UserColumn::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok(users)
    }

    /// Deactivate a user account and cascade over everything they touch.
    ///
    /// Only an existing, active admin may run this, and admin accounts are
    /// not deletable targets. One transaction, six steps:
    /// 1. soft-delete the target (`is_active = false`);
    /// 2. run the ownership-succession policy over every group they own;
    /// 3. delete all their membership rows;
    /// 4. recount `member_count` for every surviving group; steps 2 and 3
    ///    can hit the same group, so the count is rebuilt from the
    ///    membership table instead of chasing deltas;
    /// 5. delete every private message they sent or received;
    /// 6. touch `updated_at` on their posts and comments (content and
    ///    authorship stay).
    ///
    /// Any failure rolls the whole thing back.
    pub async fn delete_user(
        &self,
        target_user_id: UserId,
        acting_admin_id: UserId,
    ) -> Result<(), UsersServiceError> {
        let acting = User::find_by_id(acting_admin_id).one(&self.db).await?;
        let authorized = matches!(
            &acting,
            Some(user) if user.is_active && user.role == Role::Admin
        );
        if !authorized {
            return Err(UsersServiceError::Unauthorized);
        }

        let target = User::find_by_id(target_user_id)
            .one(&self.db)
            .await?
            .ok_or(UsersServiceError::UserNotFound)?;

        if target.role == Role::Admin {
            return Err(UsersServiceError::CannotDeleteAdmin);
        }

        let txn = self.db.begin().await?;

        // 1. Soft delete: the row is retained
        let mut deactivated: UserActiveModel = target.clone().into();
        deactivated.is_active = Set(false);
        deactivated.updated_at = Set(now_rfc3339());
        deactivated.update(&txn).await?;

        // 2. Ownership succession for every group the target owns
        let owned_groups = Group::find()
            .filter(GroupColumn::OwnerId.eq(target_user_id))
            .all(&txn)
            .await?;
        for group in &owned_groups {
            resolve_owner_removal(&txn, group, target_user_id).await?;
        }

        // 3. Drop every membership, owned groups or not
        Membership::delete_many()
            .filter(MembershipColumn::UserId.eq(target_user_id))
            .exec(&txn)
            .await?;

        // 4. Global reconciliation of the cached counts
        let surviving_groups = Group::find().all(&txn).await?;
        for group in &surviving_groups {
            recount_members(&txn, group.id).await?;
        }

        // 5. Private messages go in both directions
        PrivateMessage::delete_many()
            .filter(
                PrivateMessageColumn::SenderId
                    .eq(target_user_id)
                    .or(PrivateMessageColumn::RecipientId.eq(target_user_id)),
            )
            .exec(&txn)
            .await?;

        // 6. Authored content is retained, only the timestamp moves
        let touched_at = now_rfc3339();
        Post::update_many()
            .col_expr(PostColumn::UpdatedAt, Expr::value(touched_at.clone()))
            .filter(PostColumn::AuthorId.eq(target_user_id))
            .exec(&txn)
            .await?;
        Comment::update_many()
            .col_expr(CommentColumn::UpdatedAt, Expr::value(touched_at))
            .filter(CommentColumn::AuthorId.eq(target_user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        tracing::info!(
            target = %target_user_id,
            acting_admin = %acting_admin_id,
            owned_groups = owned_groups.len(),
            "user deactivated and cascade applied"
        );

        Ok(())
    }
}
