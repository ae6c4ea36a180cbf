use sea_orm::{DatabaseConnection, TransactionTrait};
use thiserror::Error;

use crate::{
    entity::prelude::*,
    ids::{CommentId, LikeId, PostId, UserId},
    service::now_rfc3339,
};

#[derive(Debug, Error)]
pub enum PostsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("post not found")]
    PostNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone)]
pub struct PostsService {
    db: DatabaseConnection,
}

impl PostsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new post
    pub async fn create_post(
        &self,
        author_id: UserId,
        content: String,
    ) -> Result<PostModel, PostsServiceError> {
        if content.trim().is_empty() {
            return Err(PostsServiceError::InvalidInput(
                "post content must not be empty".to_string(),
            ));
        }

        let author_exists = User::find_by_id(author_id).one(&self.db).await?.is_some();
        if !author_exists {
            return Err(PostsServiceError::UserNotFound);
        }

        let now = now_rfc3339();
        let post = PostActiveModel {
            id: Set(PostId::new()),
            author_id: Set(author_id),
            content: Set(content),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let created = Post::insert(post).exec_with_returning(&self.db).await?;
        Ok(created)
    }

    /// Get a specific post by ID
    pub async fn get_post(&self, post_id: PostId) -> Result<PostModel, PostsServiceError> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(PostsServiceError::PostNotFound)
    }

    /// List posts with pagination, newest first
    pub async fn list_posts(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<PostModel>, PostsServiceError> {
        let posts = Post::find()
            .order_by_desc(PostColumn::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok(posts)
    }

    /// Comment on a post
    pub async fn create_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        content: String,
    ) -> Result<CommentModel, PostsServiceError> {
        if content.trim().is_empty() {
            return Err(PostsServiceError::InvalidInput(
                "comment content must not be empty".to_string(),
            ));
        }

        self.get_post(post_id).await?;

        let author_exists = User::find_by_id(author_id).one(&self.db).await?.is_some();
        if !author_exists {
            return Err(PostsServiceError::UserNotFound);
        }

        let now = now_rfc3339();
        let comment = CommentActiveModel {
            id: Set(CommentId::new()),
            post_id: Set(post_id),
            author_id: Set(author_id),
            content: Set(content),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let created = Comment::insert(comment)
            .exec_with_returning(&self.db)
            .await?;
        Ok(created)
    }

    /// List comments for a post in conversation order
    pub async fn list_comments(
        &self,
        post_id: PostId,
    ) -> Result<Vec<CommentModel>, PostsServiceError> {
        let comments = Comment::find()
            .filter(CommentColumn::PostId.eq(post_id))
            .order_by_asc(CommentColumn::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(comments)
    }

    /// Like a post.
    ///
    /// Idempotent: liking a post twice returns the existing row. This is
    /// deliberately the opposite of the join-group contract, which errors
    /// on a duplicate join.
    pub async fn like_post(
        &self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<PostLikeModel, PostsServiceError> {
        self.get_post(post_id).await?;

        let user_exists = User::find_by_id(user_id).one(&self.db).await?.is_some();
        if !user_exists {
            return Err(PostsServiceError::UserNotFound);
        }

        let txn = self.db.begin().await?;

        let existing = PostLike::find()
            .filter(PostLikeColumn::PostId.eq(post_id))
            .filter(PostLikeColumn::UserId.eq(user_id))
            .one(&txn)
            .await?;

        let like = match existing {
            Some(like) => like,
            None => {
                let like = PostLikeActiveModel {
                    id: Set(LikeId::new()),
                    post_id: Set(post_id),
                    user_id: Set(user_id),
                    created_at: Set(now_rfc3339()),
                };
                PostLike::insert(like).exec_with_returning(&txn).await?
            }
        };

        txn.commit().await?;

        Ok(like)
    }

    /// Remove a like; a no-op when none exists
    pub async fn unlike_post(
        &self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<(), PostsServiceError> {
        self.get_post(post_id).await?;

        PostLike::delete_many()
            .filter(PostLikeColumn::PostId.eq(post_id))
            .filter(PostLikeColumn::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Count likes on a post
    pub async fn count_likes(&self, post_id: PostId) -> Result<u64, PostsServiceError> {
        let count = PostLike::find()
            .filter(PostLikeColumn::PostId.eq(post_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}
