use sea_orm::{DatabaseConnection, TransactionTrait};
use thiserror::Error;

use crate::{
    entity::prelude::*,
    ids::{GroupId, MembershipId, UserId},
    service::now_rfc3339,
};

#[derive(Debug, Error)]
pub enum GroupsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("group not found")]
    GroupNotFound,

    #[error("not a member of this group")]
    NotAMember,

    #[error("already a member of this group")]
    AlreadyMember,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Outcome of removing a group's owner from the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnerSuccession {
    Transferred { new_owner: UserId },
    GroupDeleted,
}

/// Pick a replacement owner for `group` when `departing_user_id` leaves,
/// or delete the group if nobody remains.
///
/// Policy, first match wins:
/// 1. an admin membership among the remaining members becomes owner;
/// 2. else any remaining membership becomes owner and is promoted to admin;
/// 3. else the group row is deleted.
///
/// The tie-break within 1 and 2 is the lowest membership id, which for
/// UUIDv7 ids means the earliest join. Runs on the caller's transaction;
/// removing the departing membership row and fixing `member_count` stay
/// the caller's job, since both the leave path and the account-removal
/// cascade reuse this.
pub(crate) async fn resolve_owner_removal<C>(
    conn: &C,
    group: &GroupModel,
    departing_user_id: UserId,
) -> Result<OwnerSuccession, DbErr>
where
    C: ConnectionTrait,
{
    let remaining = Membership::find()
        .filter(MembershipColumn::GroupId.eq(group.id))
        .filter(MembershipColumn::UserId.ne(departing_user_id));

    let successor = match remaining
        .clone()
        .filter(MembershipColumn::IsAdmin.eq(true))
        .order_by_asc(MembershipColumn::Id)
        .one(conn)
        .await?
    {
        Some(admin) => Some(admin),
        None => {
            let fallback = remaining
                .order_by_asc(MembershipColumn::Id)
                .one(conn)
                .await?;

            if let Some(member) = &fallback {
                // Promotion: the new owner must hold the admin flag
                let mut promoted: MembershipActiveModel = member.clone().into();
                promoted.is_admin = Set(true);
                promoted.update(conn).await?;
            }

            fallback
        }
    };

    match successor {
        Some(membership) => {
            let mut updated: GroupActiveModel = group.clone().into();
            updated.owner_id = Set(membership.user_id);
            updated.updated_at = Set(now_rfc3339());
            updated.update(conn).await?;

            tracing::debug!(
                group = %group.id,
                from = %departing_user_id,
                to = %membership.user_id,
                "group ownership transferred"
            );

            Ok(OwnerSuccession::Transferred {
                new_owner: membership.user_id,
            })
        }
        None => {
            Group::delete_by_id(group.id).exec(conn).await?;

            tracing::debug!(group = %group.id, "owner was the last member, group deleted");

            Ok(OwnerSuccession::GroupDeleted)
        }
    }
}

/// Rewrite `member_count` from the membership rows themselves.
///
/// Every membership-mutating path goes through here rather than applying
/// its own +1/-1, so the cache cannot drift. Touches `updated_at` only
/// when the count actually changed; a no-op on a group that no longer
/// exists.
pub(crate) async fn recount_members<C>(conn: &C, group_id: GroupId) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let Some(group) = Group::find_by_id(group_id).one(conn).await? else {
        return Ok(());
    };

    let count = Membership::find()
        .filter(MembershipColumn::GroupId.eq(group_id))
        .count(conn)
        .await? as i32;

    if group.member_count != count {
        let mut updated: GroupActiveModel = group.into();
        updated.member_count = Set(count);
        updated.updated_at = Set(now_rfc3339());
        updated.update(conn).await?;
    }

    Ok(())
}

#[derive(Clone)]
pub struct GroupsService {
    db: DatabaseConnection,
}

impl GroupsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new group with the owner enrolled as an admin member
    pub async fn create_group(
        &self,
        owner_id: UserId,
        name: String,
        is_private: bool,
    ) -> Result<GroupModel, GroupsServiceError> {
        if name.trim().is_empty() {
            return Err(GroupsServiceError::InvalidInput(
                "group name must not be empty".to_string(),
            ));
        }

        let owner_exists = User::find_by_id(owner_id).one(&self.db).await?.is_some();
        if !owner_exists {
            return Err(GroupsServiceError::UserNotFound);
        }

        let txn = self.db.begin().await?;

        let now = now_rfc3339();
        let group_id = GroupId::new();
        let group = GroupActiveModel {
            id: Set(group_id),
            owner_id: Set(owner_id),
            name: Set(name),
            is_private: Set(is_private),
            member_count: Set(0),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
        };
        Group::insert(group).exec(&txn).await?;

        let membership = MembershipActiveModel {
            id: Set(MembershipId::new()),
            group_id: Set(group_id),
            user_id: Set(owner_id),
            is_admin: Set(true),
            joined_at: Set(now),
        };
        Membership::insert(membership).exec(&txn).await?;

        recount_members(&txn, group_id).await?;

        txn.commit().await?;

        Group::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::GroupNotFound)
    }

    /// Get a specific group by ID
    pub async fn get_group(&self, group_id: GroupId) -> Result<GroupModel, GroupsServiceError> {
        Group::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::GroupNotFound)
    }

    /// List all groups the user holds a membership in
    pub async fn list_groups_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<GroupModel>, GroupsServiceError> {
        let memberships = Membership::find()
            .filter(MembershipColumn::UserId.eq(user_id))
            .all(&self.db)
            .await?;

        let group_ids: Vec<GroupId> = memberships.iter().map(|m| m.group_id).collect();

        let groups = Group::find()
            .filter(GroupColumn::Id.is_in(group_ids))
            .all(&self.db)
            .await?;

        Ok(groups)
    }

    /// List all membership rows for a group, in join order
    pub async fn list_members(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<MembershipModel>, GroupsServiceError> {
        let members = Membership::find()
            .filter(MembershipColumn::GroupId.eq(group_id))
            .order_by_asc(MembershipColumn::Id)
            .all(&self.db)
            .await?;

        Ok(members)
    }

    /// Add a user to a group as a regular member.
    ///
    /// A second join for the same pair fails with `AlreadyMember`; it does
    /// not return the existing row. The like path deliberately behaves the
    /// other way around.
    pub async fn join_group(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<MembershipModel, GroupsServiceError> {
        let user_exists = User::find_by_id(user_id).one(&self.db).await?.is_some();
        if !user_exists {
            return Err(GroupsServiceError::UserNotFound);
        }

        let group_exists = Group::find_by_id(group_id).one(&self.db).await?.is_some();
        if !group_exists {
            return Err(GroupsServiceError::GroupNotFound);
        }

        let existing = Membership::find()
            .filter(MembershipColumn::GroupId.eq(group_id))
            .filter(MembershipColumn::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(GroupsServiceError::AlreadyMember);
        }

        let txn = self.db.begin().await?;

        let membership = MembershipActiveModel {
            id: Set(MembershipId::new()),
            group_id: Set(group_id),
            user_id: Set(user_id),
            is_admin: Set(false),
            joined_at: Set(now_rfc3339()),
        };
        let created = Membership::insert(membership)
            .exec_with_returning(&txn)
            .await?;

        recount_members(&txn, group_id).await?;

        txn.commit().await?;

        Ok(created)
    }

    /// Remove a user from a group.
    ///
    /// When the departing user owns the group the succession policy runs
    /// first; if it deleted the group (no members remain) the membership
    /// cleanup and recount are skipped. Atomic either way.
    pub async fn leave_group(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), GroupsServiceError> {
        let user_exists = User::find_by_id(user_id).one(&self.db).await?.is_some();
        if !user_exists {
            return Err(GroupsServiceError::UserNotFound);
        }

        let group = Group::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::GroupNotFound)?;

        let membership = Membership::find()
            .filter(MembershipColumn::GroupId.eq(group_id))
            .filter(MembershipColumn::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::NotAMember)?;

        let txn = self.db.begin().await?;

        let mut group_deleted = false;
        if group.owner_id == user_id {
            group_deleted = matches!(
                resolve_owner_removal(&txn, &group, user_id).await?,
                OwnerSuccession::GroupDeleted
            );
        }

        if group_deleted {
            // The storage-level cascade already dropped the membership rows
            // with the group; this keeps the outcome the same where foreign
            // keys are not enforced, and must not error either way.
            Membership::delete_many()
                .filter(MembershipColumn::GroupId.eq(group_id))
                .exec(&txn)
                .await?;
        } else {
            Membership::delete_by_id(membership.id).exec(&txn).await?;
            recount_members(&txn, group_id).await?;
        }

        txn.commit().await?;

        Ok(())
    }

    /// Count members from the membership rows (the authoritative source,
    /// not the cached column)
    pub async fn count_members(&self, group_id: GroupId) -> Result<u64, GroupsServiceError> {
        let count = Membership::find()
            .filter(MembershipColumn::GroupId.eq(group_id))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::user::Role;
    use crate::models::migrator::Migrator;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use uuid::Uuid;

    async fn setup_test_service() -> GroupsService {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        GroupsService::new(db)
    }

    async fn create_test_user(service: &GroupsService, name: &str) -> UserId {
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

    /// Insert a membership row directly, with an explicit id so tests can
    /// pin the succession tie-break order.
    async fn insert_member(
        service: &GroupsService,
        membership_id: MembershipId,
        group_id: GroupId,
        user_id: UserId,
        is_admin: bool,
    ) {
        let membership = MembershipActiveModel {
            id: Set(membership_id),
            group_id: Set(group_id),
            user_id: Set(user_id),
            is_admin: Set(is_admin),
            joined_at: Set(now_rfc3339()),
        };
        Membership::insert(membership)
            .exec(&service.db)
            .await
            .unwrap();
        recount_members(&service.db, group_id).await.unwrap();
    }

    fn fixed_membership_id(n: u8) -> MembershipId {
        let s = format!("00000000-0000-7000-8000-0000000000{n:02x}");
        MembershipId::from_uuid(Uuid::parse_str(&s).unwrap())
    }

    #[tokio::test]
    async fn test_create_group_enrolls_owner_as_admin() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;

        let group = service
            .create_group(owner, "Chess Club".to_string(), false)
            .await
            .expect("Failed to create group");

        assert_eq!(group.owner_id, owner);
        assert_eq!(group.member_count, 1);

        let members = service.list_members(group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, owner);
        assert!(members[0].is_admin, "Creator should be an admin member");
    }

    #[tokio::test]
    async fn test_create_group_unknown_owner_fails() {
        let service = setup_test_service().await;

        let result = service
            .create_group(UserId::new(), "Ghost Club".to_string(), false)
            .await;
        assert!(matches!(result, Err(GroupsServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_create_group_empty_name_fails() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;

        let result = service.create_group(owner, "   ".to_string(), false).await;
        assert!(matches!(result, Err(GroupsServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_join_group() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let joiner = create_test_user(&service, "Joiner").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();

        let membership = service.join_group(group.id, joiner).await.unwrap();
        assert_eq!(membership.group_id, group.id);
        assert_eq!(membership.user_id, joiner);
        assert!(!membership.is_admin, "Joiners are not admins");

        let group = service.get_group(group.id).await.unwrap();
        assert_eq!(group.member_count, 2);
    }

    #[tokio::test]
    async fn test_join_group_twice_fails() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let joiner = create_test_user(&service, "Joiner").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();

        service.join_group(group.id, joiner).await.unwrap();
        let second = service.join_group(group.id, joiner).await;
        assert!(matches!(second, Err(GroupsServiceError::AlreadyMember)));

        // No duplicate row was created
        assert_eq!(service.count_members(group.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_join_group_preconditions() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();

        let missing_user = service.join_group(group.id, UserId::new()).await;
        assert!(matches!(
            missing_user,
            Err(GroupsServiceError::UserNotFound)
        ));

        let missing_group = service.join_group(GroupId::new(), owner).await;
        assert!(matches!(
            missing_group,
            Err(GroupsServiceError::GroupNotFound)
        ));
    }

    #[tokio::test]
    async fn test_leave_group_not_a_member_fails() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let outsider = create_test_user(&service, "Outsider").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();

        let result = service.leave_group(group.id, outsider).await;
        assert!(matches!(result, Err(GroupsServiceError::NotAMember)));
    }

    #[tokio::test]
    async fn test_non_owner_leave_keeps_owner() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let member = create_test_user(&service, "Member").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();
        service.join_group(group.id, member).await.unwrap();

        service.leave_group(group.id, member).await.unwrap();

        let group = service.get_group(group.id).await.unwrap();
        assert_eq!(group.owner_id, owner, "Owner unchanged");
        assert_eq!(group.member_count, 1);
        assert_eq!(service.count_members(group.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_owner_leave_prefers_admin_member() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let admin = create_test_user(&service, "Admin").await;
        let regular = create_test_user(&service, "Regular").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();
        insert_member(&service, MembershipId::new(), group.id, admin, true).await;
        insert_member(&service, MembershipId::new(), group.id, regular, false).await;

        service.leave_group(group.id, owner).await.unwrap();

        let group = service.get_group(group.id).await.unwrap();
        assert_eq!(group.owner_id, admin, "Admin member becomes the owner");
        assert_eq!(group.member_count, 2);

        let members = service.list_members(group.id).await.unwrap();
        let regular_row = members.iter().find(|m| m.user_id == regular).unwrap();
        assert!(
            !regular_row.is_admin,
            "Non-admin member must not be promoted when an admin exists"
        );
    }

    #[tokio::test]
    async fn test_owner_leave_promotes_non_admin() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let member = create_test_user(&service, "Member").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();
        service.join_group(group.id, member).await.unwrap();

        service.leave_group(group.id, owner).await.unwrap();

        let group = service.get_group(group.id).await.unwrap();
        assert_eq!(group.owner_id, member);

        let members = service.list_members(group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_admin, "New owner is promoted to admin");
        assert_eq!(group.member_count, 1);
    }

    #[tokio::test]
    async fn test_owner_leave_alone_deletes_group() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();

        service.leave_group(group.id, owner).await.unwrap();

        let result = service.get_group(group.id).await;
        assert!(matches!(result, Err(GroupsServiceError::GroupNotFound)));
        assert_eq!(
            service.count_members(group.id).await.unwrap(),
            0,
            "No membership rows survive the group"
        );
    }

    #[tokio::test]
    async fn test_succession_tie_break_is_earliest_membership() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let first_admin = create_test_user(&service, "First").await;
        let second_admin = create_test_user(&service, "Second").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();
        // Ids pinned so the insertion order is unambiguous
        insert_member(&service, fixed_membership_id(1), group.id, first_admin, true).await;
        insert_member(
            &service,
            fixed_membership_id(2),
            group.id,
            second_admin,
            true,
        )
        .await;

        service.leave_group(group.id, owner).await.unwrap();

        let group = service.get_group(group.id).await.unwrap();
        assert_eq!(
            group.owner_id, first_admin,
            "Lowest membership id wins the tie-break"
        );
    }

    #[tokio::test]
    async fn test_member_count_matches_rows_after_churn() {
        let service = setup_test_service().await;
        let owner = create_test_user(&service, "Owner").await;
        let a = create_test_user(&service, "A").await;
        let b = create_test_user(&service, "B").await;

        let group = service
            .create_group(owner, "Club".to_string(), false)
            .await
            .unwrap();
        service.join_group(group.id, a).await.unwrap();
        service.join_group(group.id, b).await.unwrap();
        service.leave_group(group.id, a).await.unwrap();

        let group = service.get_group(group.id).await.unwrap();
        let rows = service.count_members(group.id).await.unwrap();
        assert_eq!(group.member_count as u64, rows);
        assert_eq!(rows, 2);
    }
}
