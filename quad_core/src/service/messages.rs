use sea_orm::{Condition, DatabaseConnection};
use thiserror::Error;

use crate::{
    entity::prelude::*,
    ids::{MessageId, UserId},
    service::now_rfc3339,
};

#[derive(Debug, Error)]
pub enum MessagesServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error("unauthorized: not the recipient")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone)]
pub struct MessagesService {
    db: DatabaseConnection,
}

impl MessagesService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Send a private message
    pub async fn send_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        content: String,
    ) -> Result<PrivateMessageModel, MessagesServiceError> {
        if content.trim().is_empty() {
            return Err(MessagesServiceError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        let sender_exists = User::find_by_id(sender_id).one(&self.db).await?.is_some();
        if !sender_exists {
            return Err(MessagesServiceError::UserNotFound);
        }

        let recipient_exists = User::find_by_id(recipient_id)
            .one(&self.db)
            .await?
            .is_some();
        if !recipient_exists {
            return Err(MessagesServiceError::UserNotFound);
        }

        let message = PrivateMessageActiveModel {
            id: Set(MessageId::new()),
            sender_id: Set(sender_id),
            recipient_id: Set(recipient_id),
            content: Set(content),
            is_read: Set(false),
            created_at: Set(now_rfc3339()),
        };

        let created = PrivateMessage::insert(message)
            .exec_with_returning(&self.db)
            .await?;
        Ok(created)
    }

    /// List the messages exchanged between two users, oldest first
    pub async fn list_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<PrivateMessageModel>, MessagesServiceError> {
        let between = Condition::any()
            .add(
                PrivateMessageColumn::SenderId
                    .eq(a)
                    .and(PrivateMessageColumn::RecipientId.eq(b)),
            )
            .add(
                PrivateMessageColumn::SenderId
                    .eq(b)
                    .and(PrivateMessageColumn::RecipientId.eq(a)),
            );

        let messages = PrivateMessage::find()
            .filter(between)
            .order_by_asc(PrivateMessageColumn::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok(messages)
    }

    /// Mark a message read; only its recipient may do so
    pub async fn mark_read(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<PrivateMessageModel, MessagesServiceError> {
        let message = PrivateMessage::find_by_id(message_id)
            .one(&self.db)
            .await?
            .ok_or(MessagesServiceError::MessageNotFound)?;

        if message.recipient_id != user_id {
            return Err(MessagesServiceError::Unauthorized);
        }

        let mut updated: PrivateMessageActiveModel = message.into();
        updated.is_read = Set(true);
        let updated = updated.update(&self.db).await?;

        Ok(updated)
    }

    /// Count unread messages waiting for a user
    pub async fn unread_count(&self, user_id: UserId) -> Result<u64, MessagesServiceError> {
        let count = PrivateMessage::find()
            .filter(PrivateMessageColumn::RecipientId.eq(user_id))
            .filter(PrivateMessageColumn::IsRead.eq(false))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::migrator::Migrator;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    async fn setup_test_service() -> MessagesService {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        MessagesService::new(db)
    }

    async fn create_test_user(service: &MessagesService, name: &str) -> UserId {
        let user_id = UserId::new();
        let now = now_rfc3339();
        let user = UserActiveModel {
            id: Set(user_id),
            name: Set(name.to_string()),
            email: Set(format!("{user_id}@example.edu")),
            role: Set(Role::Student),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };
        User::insert(user).exec(&service.db).await.unwrap();
        user_id
    }

    #[tokio::test]
    async fn test_send_and_list_conversation() {
        let service = setup_test_service().await;
        let alice = create_test_user(&service, "Alice").await;
        let bob = create_test_user(&service, "Bob").await;
        let carol = create_test_user(&service, "Carol").await;

        service
            .send_message(alice, bob, "hi bob".to_string())
            .await
            .unwrap();
        service
            .send_message(bob, alice, "hi alice".to_string())
            .await
            .unwrap();
        service
            .send_message(alice, carol, "hi carol".to_string())
            .await
            .unwrap();

        let conversation = service.list_conversation(alice, bob, 10, 0).await.unwrap();
        assert_eq!(conversation.len(), 2, "Third-party messages excluded");
        assert_eq!(conversation[0].content, "hi bob");
    }

    #[tokio::test]
    async fn test_send_message_validation() {
        let service = setup_test_service().await;
        let alice = create_test_user(&service, "Alice").await;

        let result = service
            .send_message(alice, UserId::new(), "hello?".to_string())
            .await;
        assert!(matches!(result, Err(MessagesServiceError::UserNotFound)));

        let bob = create_test_user(&service, "Bob").await;
        let result = service.send_message(alice, bob, "  ".to_string()).await;
        assert!(matches!(result, Err(MessagesServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_mark_read_by_recipient_only() {
        let service = setup_test_service().await;
        let alice = create_test_user(&service, "Alice").await;
        let bob = create_test_user(&service, "Bob").await;

        let message = service
            .send_message(alice, bob, "read me".to_string())
            .await
            .unwrap();

        let result = service.mark_read(message.id, alice).await;
        assert!(matches!(result, Err(MessagesServiceError::Unauthorized)));

        let updated = service.mark_read(message.id, bob).await.unwrap();
        assert!(updated.is_read);
        assert_eq!(service.unread_count(bob).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unread_count() {
        let service = setup_test_service().await;
        let alice = create_test_user(&service, "Alice").await;
        let bob = create_test_user(&service, "Bob").await;

        service
            .send_message(alice, bob, "one".to_string())
            .await
            .unwrap();
        service
            .send_message(alice, bob, "two".to_string())
            .await
            .unwrap();

        assert_eq!(service.unread_count(bob).await.unwrap(), 2);
        assert_eq!(service.unread_count(alice).await.unwrap(), 0);
    }
}
