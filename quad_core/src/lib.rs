pub mod entity;
pub mod ids;
pub mod models;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;

use crate::service::{
    groups::GroupsService, messages::MessagesService, posts::PostsService, users::UsersService,
};

pub mod service;

pub mod config;

static QUAD_CORE: OnceCell<Arc<QuadCore>> = OnceCell::const_new();

pub async fn core() -> Arc<QuadCore> {
    QUAD_CORE
        .get_or_init(|| async move { Arc::new(QuadCore::start().await.expect("failed to init")) })
        .await
        .clone()
}

/// Main runtime handle for Quad.
pub struct QuadCore {
    pub config: config::QuadConfig,

    pub db: DatabaseConnection,

    /// Typed services over the shared database.
    pub users: UsersService,
    pub groups: GroupsService,
    pub posts: PostsService,
    pub messages: MessagesService,
}

impl QuadCore {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let config = config::get_or_init().await?;
        tracing::debug!(?config, "starting quad core");

        // DB + migrations
        let db = models::open_or_create_db(&config).await?;
        models::migrate_up(&db).await?;

        let users = UsersService::new(db.clone());
        let groups = GroupsService::new(db.clone());
        let posts = PostsService::new(db.clone());
        let messages = MessagesService::new(db.clone());

        Ok(Self {
            config,
            db,
            users,
            groups,
            posts,
            messages,
        })
    }

    pub async fn shutdown(self) -> Result<(), Box<dyn std::error::Error>> {
        self.db.close().await?;
        Ok(())
    }
}

pub mod prelude {
    pub use super::entity;
    pub use super::ids;
    pub use super::models;

    pub use super::service;

    pub use super::config;
}
