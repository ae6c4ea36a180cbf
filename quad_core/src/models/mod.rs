use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::config::QuadConfig;

pub mod migrator;

pub async fn open_or_create_db(config: &QuadConfig) -> Result<DatabaseConnection, DbErr> {
    // Use display() to convert PathBuf to string representation
    let connection_string = format!("sqlite://{}?mode=rwc", config.database_path.display());

    Database::connect(&connection_string).await
}

pub async fn migrate_up(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrator::Migrator::up(db, None).await
}
