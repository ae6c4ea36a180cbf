use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260815_000004_create_private_messages_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PrivateMessage::Table)
                    .col(
                        ColumnDef::new(PrivateMessage::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PrivateMessage::SenderId).uuid().not_null())
                    .col(
                        ColumnDef::new(PrivateMessage::RecipientId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PrivateMessage::Content).string().not_null())
                    .col(
                        ColumnDef::new(PrivateMessage::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PrivateMessage::CreatedAt)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_private_message_sender_id")
                            .from(PrivateMessage::Table, PrivateMessage::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_private_message_recipient_id")
                            .from(PrivateMessage::Table, PrivateMessage::RecipientId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_private_messages_sender_id")
                    .table(PrivateMessage::Table)
                    .col(PrivateMessage::SenderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_private_messages_recipient_id")
                    .table(PrivateMessage::Table)
                    .col(PrivateMessage::RecipientId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PrivateMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PrivateMessage {
    Table,
    Id,
    SenderId,
    RecipientId,
    Content,
    IsRead,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
