use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260815_000003_create_memberships_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Membership::Table)
                    .col(
                        ColumnDef::new(Membership::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Membership::GroupId).uuid().not_null())
                    .col(ColumnDef::new(Membership::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Membership::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Membership::JoinedAt).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_membership_group_id")
                            .from(Membership::Table, Membership::GroupId)
                            .to(Group::Table, Group::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_membership_user_id")
                            .from(Membership::Table, Membership::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One membership row per (group, user)
        manager
            .create_index(
                Index::create()
                    .name("idx_memberships_group_user_unique")
                    .table(Membership::Table)
                    .col(Membership::GroupId)
                    .col(Membership::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_memberships_group_id")
                    .table(Membership::Table)
                    .col(Membership::GroupId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_memberships_user_id")
                    .table(Membership::Table)
                    .col(Membership::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Membership::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Membership {
    Table,
    Id,
    GroupId,
    UserId,
    IsAdmin,
    JoinedAt,
}

#[derive(Iden)]
enum Group {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
