use std::ops::RangeInclusive;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::{GroupId, UserId},
    models::cascade,
    service::{
        messages::{with_authors, MessageWithAuthor},
        session::{Actor, Sessions},
    },
};

pub const GROUP_NAME_CHARS: RangeInclusive<usize> = 3..=50;
pub const GROUP_DESCRIPTION_CHARS: RangeInclusive<usize> = 1..=500;

#[derive(Debug, Error)]
pub enum GroupsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("group not found")]
    GroupNotFound,

    #[error("member not found")]
    MemberNotFound,

    #[error("you are not a member of this group")]
    NotMember,

    #[error("unauthorized: moderator only")]
    Unauthorized,

    #[error("group name must be 3 to 50 characters")]
    InvalidName,

    #[error("group description must be 1 to 500 characters")]
    InvalidDescription,

    #[error("your join request is still pending")]
    RequestPending,

    #[error("you are already a member of this group")]
    AlreadyMember,

    #[error("the moderator cannot be removed from their group")]
    CannotRemoveModerator,

    #[error("the moderator cannot leave, delete the group instead")]
    ModeratorCannotLeave,
}

impl From<GroupsServiceError> for ResourceError {
    fn from(error: GroupsServiceError) -> Self {
        match error {
            GroupsServiceError::DbError(error) => ResourceError::infra(error),
            _ => ResourceError::app(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: GroupModel,
    pub moderator: UserModel,
    pub message_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWithUser {
    pub membership: GroupMemberModel,
    pub user: UserModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub membership: GroupMemberModel,
    pub group: GroupModel,
}

/// A group page. Messages are only filled in for active members and
/// administrators, pending requests only for the moderator and
/// administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDetails {
    pub group: GroupModel,
    pub moderator: UserModel,
    pub messages: Vec<MessageWithAuthor>,
    pub active_members: u64,
    pub pending: Vec<MemberWithUser>,
    pub members: Vec<MemberWithUser>,
    pub viewer_status: Option<MembershipStatus>,
}

pub async fn membership_status<C: ConnectionTrait>(
    db: &C,
    group_id: GroupId,
    user_id: UserId,
) -> Result<Option<MembershipStatus>, DbErr> {
    let row = GroupMember::find_by_id((group_id, user_id)).one(db).await?;
    Ok(row.map(|row| row.status))
}

#[derive(Clone)]
pub struct GroupsService {
    db: DatabaseConnection,
    sessions: Sessions,
}

impl GroupsService {
    pub fn new(db: DatabaseConnection) -> Self {
        let sessions = Sessions::new(db.clone());
        Self { db, sessions }
    }

    /// The creator becomes the moderator and first member.
    pub async fn _create(
        &self,
        actor: &Actor,
        name: String,
        description: String,
    ) -> Result<GroupModel, GroupsServiceError> {
        let (name, description) = validate(name, description)?;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let group = GroupActiveModel {
            id: Set(GroupId::new()),
            name: Set(name),
            description: Set(description),
            moderator_id: Set(actor.id),
            created_at: Set(now),
        };
        let group = Group::insert(group).exec_with_returning(&txn).await?;

        let membership = GroupMemberActiveModel {
            group_id: Set(group.id),
            user_id: Set(actor.id),
            status: Set(MembershipStatus::Moderator),
            joined_at: Set(now),
        };
        GroupMember::insert(membership).exec(&txn).await?;

        txn.commit().await?;

        info!(group_id = %group.id, moderator = %actor.id, "group created");
        Ok(group)
    }

    pub async fn _get_group(&self, group_id: GroupId) -> Result<GroupModel, GroupsServiceError> {
        Group::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::GroupNotFound)
    }

    pub async fn _list(&self) -> Result<Vec<GroupSummary>, GroupsServiceError> {
        let groups = Group::find()
            .order_by_desc(GroupColumn::CreatedAt)
            .find_also_related(User)
            .all(&self.db)
            .await?;

        let mut summaries = Vec::with_capacity(groups.len());
        for (group, moderator) in groups {
            let Some(moderator) = moderator else {
                continue;
            };
            let message_count = Message::find()
                .filter(MessageColumn::GroupId.eq(group.id))
                .count(&self.db)
                .await?;
            summaries.push(GroupSummary {
                group,
                moderator,
                message_count,
            });
        }

        Ok(summaries)
    }

    pub async fn _details(
        &self,
        viewer: Option<&Actor>,
        group_id: GroupId,
    ) -> Result<GroupDetails, GroupsServiceError> {
        let (group, moderator) = Group::find_by_id(group_id)
            .find_also_related(User)
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::GroupNotFound)?;
        let moderator = moderator.ok_or(GroupsServiceError::GroupNotFound)?;

        let viewer_status = match viewer {
            Some(viewer) => membership_status(&self.db, group.id, viewer.id).await?,
            None => None,
        };
        let is_admin = viewer.is_some_and(Actor::is_admin);
        let is_active = viewer_status.is_some_and(MembershipStatus::is_active);
        let is_moderator = viewer_status == Some(MembershipStatus::Moderator);

        let rows = GroupMember::find()
            .filter(GroupMemberColumn::GroupId.eq(group.id))
            .order_by_asc(GroupMemberColumn::JoinedAt)
            .find_also_related(User)
            .all(&self.db)
            .await?;

        let mut pending = Vec::new();
        let mut members = Vec::new();
        for (membership, user) in rows {
            let Some(user) = user else {
                continue;
            };
            let entry = MemberWithUser { membership, user };
            if entry.membership.status.is_active() {
                members.push(entry);
            } else if is_moderator || is_admin {
                pending.push(entry);
            }
        }

        let messages = if is_active || is_admin {
            let messages = Message::find()
                .filter(MessageColumn::GroupId.eq(group.id))
                .order_by_desc(MessageColumn::CreatedAt)
                .all(&self.db)
                .await?;
            with_authors(&self.db, messages).await?
        } else {
            Vec::new()
        };

        Ok(GroupDetails {
            group,
            moderator,
            messages,
            active_members: members.len() as u64,
            pending,
            members,
            viewer_status,
        })
    }

    pub async fn _edit(
        &self,
        actor: &Actor,
        group_id: GroupId,
        name: String,
        description: String,
    ) -> Result<GroupModel, GroupsServiceError> {
        let group = self._get_group(group_id).await?;
        if group.moderator_id != actor.id {
            return Err(GroupsServiceError::Unauthorized);
        }

        let (name, description) = validate(name, description)?;

        let mut group: GroupActiveModel = group.into();
        group.name = Set(name);
        group.description = Set(description);
        Ok(group.update(&self.db).await?)
    }

    pub async fn _delete(&self, actor: &Actor, group_id: GroupId) -> Result<(), GroupsServiceError> {
        let group = self._get_group(group_id).await?;
        if !actor.can_manage(group.moderator_id) {
            return Err(GroupsServiceError::Unauthorized);
        }

        let txn = self.db.begin().await?;
        cascade::delete_group_tree(&txn, group.id).await?;
        txn.commit().await?;

        info!(%group_id, by = %actor.id, "group deleted");
        Ok(())
    }

    /// Files a join request for the moderator to accept.
    pub async fn _join(
        &self,
        actor: &Actor,
        group_id: GroupId,
    ) -> Result<GroupMemberModel, GroupsServiceError> {
        let group = self._get_group(group_id).await?;

        match membership_status(&self.db, group.id, actor.id).await? {
            Some(MembershipStatus::Pending) => return Err(GroupsServiceError::RequestPending),
            Some(MembershipStatus::Accepted | MembershipStatus::Moderator) => {
                return Err(GroupsServiceError::AlreadyMember)
            }
            None => {}
        }

        let membership = GroupMemberActiveModel {
            group_id: Set(group.id),
            user_id: Set(actor.id),
            status: Set(MembershipStatus::Pending),
            joined_at: Set(Utc::now()),
        };
        let membership = GroupMember::insert(membership)
            .exec_with_returning(&self.db)
            .await?;
        Ok(membership)
    }

    pub async fn _accept_member(
        &self,
        actor: &Actor,
        group_id: GroupId,
        member_id: UserId,
    ) -> Result<GroupMemberModel, GroupsServiceError> {
        self.require_moderator(actor, group_id).await?;

        let membership = GroupMember::find_by_id((group_id, member_id))
            .one(&self.db)
            .await?
            .ok_or(GroupsServiceError::MemberNotFound)?;
        if membership.status == MembershipStatus::Moderator {
            return Ok(membership);
        }

        let mut membership: GroupMemberActiveModel = membership.into();
        membership.status = Set(MembershipStatus::Accepted);
        Ok(membership.update(&self.db).await?)
    }

    /// Also used to decline pending requests.
    pub async fn _remove_member(
        &self,
        actor: &Actor,
        group_id: GroupId,
        member_id: UserId,
    ) -> Result<(), GroupsServiceError> {
        let group = self.require_moderator(actor, group_id).await?;
        if member_id == group.moderator_id {
            return Err(GroupsServiceError::CannotRemoveModerator);
        }

        let result = GroupMember::delete_by_id((group_id, member_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(GroupsServiceError::MemberNotFound);
        }
        Ok(())
    }

    pub async fn _leave(&self, actor: &Actor, group_id: GroupId) -> Result<(), GroupsServiceError> {
        let group = self._get_group(group_id).await?;

        match membership_status(&self.db, group.id, actor.id).await? {
            None => Err(GroupsServiceError::NotMember),
            Some(MembershipStatus::Moderator) => Err(GroupsServiceError::ModeratorCannotLeave),
            Some(_) => {
                GroupMember::delete_by_id((group.id, actor.id))
                    .exec(&self.db)
                    .await?;
                Ok(())
            }
        }
    }

    /// Groups the actor can take part in.
    pub async fn _my_groups(&self, actor: &Actor) -> Result<Vec<Membership>, GroupsServiceError> {
        let rows = GroupMember::find()
            .filter(GroupMemberColumn::UserId.eq(actor.id))
            .filter(GroupMemberColumn::Status.ne(MembershipStatus::Pending))
            .order_by_desc(GroupMemberColumn::JoinedAt)
            .find_also_related(Group)
            .all(&self.db)
            .await?;
        Ok(into_memberships(rows))
    }

    /// Every membership row of a user, pending included.
    pub async fn _memberships_of(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<Vec<Membership>, GroupsServiceError> {
        if !actor.is_admin() {
            return Err(GroupsServiceError::Unauthorized);
        }

        let rows = GroupMember::find()
            .filter(GroupMemberColumn::UserId.eq(user_id))
            .order_by_desc(GroupMemberColumn::JoinedAt)
            .find_also_related(Group)
            .all(&self.db)
            .await?;
        Ok(into_memberships(rows))
    }

    async fn require_moderator(
        &self,
        actor: &Actor,
        group_id: GroupId,
    ) -> Result<GroupModel, GroupsServiceError> {
        let group = self._get_group(group_id).await?;
        let status = membership_status(&self.db, group.id, actor.id).await?;
        if status != Some(MembershipStatus::Moderator) {
            return Err(GroupsServiceError::Unauthorized);
        }
        Ok(group)
    }
}

fn into_memberships(rows: Vec<(GroupMemberModel, Option<GroupModel>)>) -> Vec<Membership> {
    rows.into_iter()
        .filter_map(|(membership, group)| group.map(|group| Membership { membership, group }))
        .collect()
}

fn validate(name: String, description: String) -> Result<(String, String), GroupsServiceError> {
    let name = name.trim().to_string();
    let description = description.trim().to_string();

    if !GROUP_NAME_CHARS.contains(&name.chars().count()) {
        return Err(GroupsServiceError::InvalidName);
    }
    if !GROUP_DESCRIPTION_CHARS.contains(&description.chars().count()) {
        return Err(GroupsServiceError::InvalidDescription);
    }
    Ok((name, description))
}

#[zel_service(name = "groups")]
trait Groups {
    #[method(name = "create")]
    async fn create(&self, name: String, description: String) -> Result<GroupModel, ResourceError>;

    #[method(name = "list")]
    async fn list(&self) -> Result<Vec<GroupSummary>, ResourceError>;

    #[method(name = "details")]
    async fn details(&self, group_id: GroupId) -> Result<GroupDetails, ResourceError>;

    #[method(name = "edit")]
    async fn edit(
        &self,
        group_id: GroupId,
        name: String,
        description: String,
    ) -> Result<GroupModel, ResourceError>;

    #[method(name = "delete")]
    async fn delete(&self, group_id: GroupId) -> Result<(), ResourceError>;

    #[method(name = "join")]
    async fn join(&self, group_id: GroupId) -> Result<GroupMemberModel, ResourceError>;

    #[method(name = "accept_member")]
    async fn accept_member(
        &self,
        group_id: GroupId,
        member_id: UserId,
    ) -> Result<GroupMemberModel, ResourceError>;

    #[method(name = "remove_member")]
    async fn remove_member(&self, group_id: GroupId, member_id: UserId) -> Result<(), ResourceError>;

    #[method(name = "leave")]
    async fn leave(&self, group_id: GroupId) -> Result<(), ResourceError>;

    #[method(name = "my_groups")]
    async fn my_groups(&self) -> Result<Vec<Membership>, ResourceError>;

    #[method(name = "memberships_of")]
    async fn memberships_of(&self, user_id: UserId) -> Result<Vec<Membership>, ResourceError>;
}

#[async_trait]
impl GroupsServer for GroupsService {
    async fn create(
        &self,
        ctx: RequestContext,
        name: String,
        description: String,
    ) -> Result<GroupModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._create(&actor, name, description).await?)
    }

    async fn list(&self, _ctx: RequestContext) -> Result<Vec<GroupSummary>, ResourceError> {
        Ok(self._list().await?)
    }

    async fn details(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
    ) -> Result<GroupDetails, ResourceError> {
        let viewer = self.sessions.viewer(&ctx).await?;
        Ok(self._details(viewer.as_ref(), group_id).await?)
    }

    async fn edit(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
        name: String,
        description: String,
    ) -> Result<GroupModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._edit(&actor, group_id, name, description).await?)
    }

    async fn delete(&self, ctx: RequestContext, group_id: GroupId) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._delete(&actor, group_id).await?)
    }

    async fn join(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
    ) -> Result<GroupMemberModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._join(&actor, group_id).await?)
    }

    async fn accept_member(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
        member_id: UserId,
    ) -> Result<GroupMemberModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._accept_member(&actor, group_id, member_id).await?)
    }

    async fn remove_member(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
        member_id: UserId,
    ) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._remove_member(&actor, group_id, member_id).await?)
    }

    async fn leave(&self, ctx: RequestContext, group_id: GroupId) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._leave(&actor, group_id).await?)
    }

    async fn my_groups(&self, ctx: RequestContext) -> Result<Vec<Membership>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._my_groups(&actor).await?)
    }

    async fn memberships_of(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<Vec<Membership>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._memberships_of(&actor, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_db, register_admin, register_user};

    async fn setup_test_service() -> GroupsService {
        GroupsService::new(create_test_db().await)
    }

    async fn create_group(service: &GroupsService, moderator: &Actor) -> GroupModel {
        service
            ._create(moderator, "Rustaceans".to_string(), "All things crab".to_string())
            .await
            .expect("Failed to create group")
    }

    #[tokio::test]
    async fn test_create_makes_creator_moderator() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;

        let group = create_group(&service, &alice).await;
        assert_eq!(group.moderator_id, alice.id);
        assert_eq!(
            membership_status(&service.db, group.id, alice.id).await.unwrap(),
            Some(MembershipStatus::Moderator)
        );

        let list = service._list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].moderator.id, alice.id);
        assert_eq!(list[0].message_count, 0);
    }

    #[tokio::test]
    async fn test_create_validates_lengths() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;

        assert!(matches!(
            service._create(&alice, "ab".to_string(), "desc".to_string()).await,
            Err(GroupsServiceError::InvalidName)
        ));
        assert!(matches!(
            service._create(&alice, "x".repeat(51), "desc".to_string()).await,
            Err(GroupsServiceError::InvalidName)
        ));
        assert!(matches!(
            service._create(&alice, "abc".to_string(), "  ".to_string()).await,
            Err(GroupsServiceError::InvalidDescription)
        ));
        assert!(matches!(
            service._create(&alice, "abc".to_string(), "d".repeat(501)).await,
            Err(GroupsServiceError::InvalidDescription)
        ));
        assert_eq!(Group::find().count(&service.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_join_flow() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let group = create_group(&service, &alice).await;

        let request = service._join(&bob, group.id).await.unwrap();
        assert_eq!(request.status, MembershipStatus::Pending);

        assert!(matches!(
            service._join(&bob, group.id).await,
            Err(GroupsServiceError::RequestPending)
        ));
        assert!(matches!(
            service._join(&alice, group.id).await,
            Err(GroupsServiceError::AlreadyMember)
        ));

        // Only the moderator answers requests
        assert!(matches!(
            service._accept_member(&bob, group.id, bob.id).await,
            Err(GroupsServiceError::Unauthorized)
        ));

        let accepted = service._accept_member(&alice, group.id, bob.id).await.unwrap();
        assert_eq!(accepted.status, MembershipStatus::Accepted);
        assert!(matches!(
            service._join(&bob, group.id).await,
            Err(GroupsServiceError::AlreadyMember)
        ));

        let mine = service._my_groups(&bob).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].group.id, group.id);
    }

    #[tokio::test]
    async fn test_details_depends_on_viewer() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let carol = register_user(&service.db, "carol").await;
        let group = create_group(&service, &alice).await;
        service._join(&bob, group.id).await.unwrap();
        service._join(&carol, group.id).await.unwrap();
        service._accept_member(&alice, group.id, carol.id).await.unwrap();

        let as_moderator = service._details(Some(&alice), group.id).await.unwrap();
        assert_eq!(as_moderator.active_members, 2);
        assert_eq!(as_moderator.pending.len(), 1);
        assert_eq!(as_moderator.pending[0].user.id, bob.id);
        assert_eq!(as_moderator.viewer_status, Some(MembershipStatus::Moderator));

        let as_pending = service._details(Some(&bob), group.id).await.unwrap();
        assert!(as_pending.pending.is_empty());
        assert_eq!(as_pending.viewer_status, Some(MembershipStatus::Pending));

        let anonymous = service._details(None, group.id).await.unwrap();
        assert_eq!(anonymous.viewer_status, None);
        assert_eq!(anonymous.members.len(), 2);
    }

    #[tokio::test]
    async fn test_edit_is_moderator_only() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let admin = register_admin(&service.db, "root").await;
        let group = create_group(&service, &alice).await;

        let edited = service
            ._edit(&alice, group.id, "Crustaceans".to_string(), "Wider scope".to_string())
            .await
            .unwrap();
        assert_eq!(edited.name, "Crustaceans");

        assert!(matches!(
            service
                ._edit(&admin, group.id, "Hijacked".to_string(), "x".to_string())
                .await,
            Err(GroupsServiceError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_delete_by_moderator_or_admin() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let admin = register_admin(&service.db, "root").await;
        let first = create_group(&service, &alice).await;
        let second = create_group(&service, &alice).await;
        service._join(&bob, first.id).await.unwrap();

        assert!(matches!(
            service._delete(&bob, first.id).await,
            Err(GroupsServiceError::Unauthorized)
        ));

        service._delete(&alice, first.id).await.unwrap();
        service._delete(&admin, second.id).await.unwrap();

        assert_eq!(Group::find().count(&service.db).await.unwrap(), 0);
        assert_eq!(GroupMember::find().count(&service.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_member_and_leave() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let carol = register_user(&service.db, "carol").await;
        let group = create_group(&service, &alice).await;
        service._join(&bob, group.id).await.unwrap();
        service._join(&carol, group.id).await.unwrap();

        assert!(matches!(
            service._remove_member(&alice, group.id, alice.id).await,
            Err(GroupsServiceError::CannotRemoveModerator)
        ));
        assert!(matches!(
            service._remove_member(&bob, group.id, carol.id).await,
            Err(GroupsServiceError::Unauthorized)
        ));

        service._remove_member(&alice, group.id, bob.id).await.unwrap();
        assert!(matches!(
            service._remove_member(&alice, group.id, bob.id).await,
            Err(GroupsServiceError::MemberNotFound)
        ));

        assert!(matches!(
            service._leave(&alice, group.id).await,
            Err(GroupsServiceError::ModeratorCannotLeave)
        ));
        service._leave(&carol, group.id).await.unwrap();
        assert!(matches!(
            service._leave(&carol, group.id).await,
            Err(GroupsServiceError::NotMember)
        ));
    }

    #[tokio::test]
    async fn test_memberships_of_is_admin_only() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let admin = register_admin(&service.db, "root").await;
        let group = create_group(&service, &alice).await;
        service._join(&bob, group.id).await.unwrap();

        assert!(matches!(
            service._memberships_of(&bob, bob.id).await,
            Err(GroupsServiceError::Unauthorized)
        ));

        let rows = service._memberships_of(&admin, bob.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].membership.status, MembershipStatus::Pending);
        assert!(service._my_groups(&bob).await.unwrap().is_empty());
    }
}
