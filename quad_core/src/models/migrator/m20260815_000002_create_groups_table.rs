use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260815_000002_create_groups_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Group::Table)
                    .col(ColumnDef::new(Group::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Group::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Group::Name).string().not_null())
                    .col(
                        ColumnDef::new(Group::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Group::MemberCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Group::CreatedAt).string().not_null())
                    .col(ColumnDef::new(Group::UpdatedAt).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_owner_id")
                            .from(Group::Table, Group::OwnerId)
                            .to(User::Table, User::Id)
                            // Users are soft-deleted, so this never fires;
                            // Restrict guards against an accidental purge.
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_groups_owner_id")
                    .table(Group::Table)
                    .col(Group::OwnerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Group::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Group {
    Table,
    Id,
    OwnerId,
    Name,
    IsPrivate,
    MemberCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
