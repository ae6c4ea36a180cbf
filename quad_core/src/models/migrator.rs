use sea_orm_migration::prelude::*;

mod m20260815_000001_create_users_table;
mod m20260815_000002_create_groups_table;
mod m20260815_000003_create_memberships_table;
mod m20260815_000004_create_private_messages_table;
mod m20260815_000005_create_posts_table;
mod m20260815_000006_create_comments_table;
mod m20260815_000007_create_post_likes_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260815_000001_create_users_table::Migration),
            Box::new(m20260815_000002_create_groups_table::Migration),
            Box::new(m20260815_000003_create_memberships_table::Migration),
            Box::new(m20260815_000004_create_private_messages_table::Migration),
            Box::new(m20260815_000005_create_posts_table::Migration),
            Box::new(m20260815_000006_create_comments_table::Migration),
            Box::new(m20260815_000007_create_post_likes_table::Migration),
        ]
    }
}

#[cfg(test)]
use sea_orm::{Database, DbErr};

#[tokio::test]
async fn test_migrations_okay() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::refresh(&db).await?;

    assert!(schema_manager.has_table("user").await?);
    assert!(schema_manager.has_table("group").await?);
    assert!(schema_manager.has_table("membership").await?);
    assert!(schema_manager.has_table("private_message").await?);
    assert!(schema_manager.has_table("post").await?);
    assert!(schema_manager.has_table("comment").await?);
    assert!(schema_manager.has_table("post_like").await?);

    Ok(())
}
