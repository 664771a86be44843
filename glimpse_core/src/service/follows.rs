use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::UserId,
    models::is_unique_violation,
    service::session::{Actor, Sessions},
};

#[derive(Debug, Error)]
pub enum FollowsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("you cannot follow yourself")]
    CannotFollowSelf,

    #[error("follow request not found")]
    RequestNotFound,
}

impl From<FollowsServiceError> for ResourceError {
    fn from(error: FollowsServiceError) -> Self {
        match error {
            FollowsServiceError::DbError(error) => ResourceError::infra(error),
            FollowsServiceError::UserNotFound => ResourceError::app(error),
            FollowsServiceError::CannotFollowSelf => ResourceError::app(error),
            FollowsServiceError::RequestNotFound => ResourceError::app(error),
        }
    }
}

/// Where the caller stands after toggling a follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowState {
    NotFollowing,
    Pending,
    Following,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowDecision {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRequest {
    pub request: FollowRequestModel,
    pub follower: UserModel,
}

pub async fn follow_status<C: ConnectionTrait>(
    db: &C,
    follower_id: UserId,
    following_id: UserId,
) -> Result<Option<FollowStatus>, DbErr> {
    let edge = FollowRequest::find_by_id((follower_id, following_id))
        .one(db)
        .await?;
    Ok(edge.map(|edge| edge.status))
}

/// Accepted edges only.
pub async fn count_follows<C: ConnectionTrait>(
    db: &C,
    user_id: UserId,
) -> Result<FollowCounts, DbErr> {
    let followers = FollowRequest::find()
        .filter(FollowRequestColumn::FollowingId.eq(user_id))
        .filter(FollowRequestColumn::Status.eq(FollowStatus::Accepted))
        .count(db)
        .await?;
    let following = FollowRequest::find()
        .filter(FollowRequestColumn::FollowerId.eq(user_id))
        .filter(FollowRequestColumn::Status.eq(FollowStatus::Accepted))
        .count(db)
        .await?;

    Ok(FollowCounts {
        followers,
        following,
    })
}

/// Users `follower_id` follows with an accepted request.
pub async fn followed_ids<C: ConnectionTrait>(
    db: &C,
    follower_id: UserId,
) -> Result<Vec<UserId>, DbErr> {
    let edges = FollowRequest::find()
        .filter(FollowRequestColumn::FollowerId.eq(follower_id))
        .filter(FollowRequestColumn::Status.eq(FollowStatus::Accepted))
        .all(db)
        .await?;
    Ok(edges.into_iter().map(|edge| edge.following_id).collect())
}

#[derive(Clone)]
pub struct FollowsService {
    db: DatabaseConnection,
    sessions: Sessions,
}

impl FollowsService {
    pub fn new(db: DatabaseConnection) -> Self {
        let sessions = Sessions::new(db.clone());
        Self { db, sessions }
    }

    /// Follows `target`, or drops the existing edge whatever its status.
    /// A Declined edge is cleared by the first toggle, so a second toggle
    /// sends a fresh request.
    pub async fn _toggle_follow(
        &self,
        actor: &Actor,
        target: UserId,
    ) -> Result<FollowState, FollowsServiceError> {
        if actor.id == target {
            return Err(FollowsServiceError::CannotFollowSelf);
        }

        let target = User::find_by_id(target)
            .one(&self.db)
            .await?
            .ok_or(FollowsServiceError::UserNotFound)?;

        let txn = self.db.begin().await?;

        if follow_status(&txn, actor.id, target.id).await?.is_some() {
            FollowRequest::delete_by_id((actor.id, target.id))
                .exec(&txn)
                .await?;
            txn.commit().await?;
            debug!(follower = %actor.id, following = %target.id, "unfollowed");
            return Ok(FollowState::NotFollowing);
        }

        // Public accounts accept followers automatically
        let (status, state) = if target.is_public {
            (FollowStatus::Accepted, FollowState::Following)
        } else {
            (FollowStatus::Pending, FollowState::Pending)
        };

        let edge = FollowRequestActiveModel {
            follower_id: Set(actor.id),
            following_id: Set(target.id),
            status: Set(status),
            created_at: Set(Utc::now()),
        };
        match FollowRequest::insert(edge).exec(&txn).await {
            Ok(_) => {}
            // A concurrent toggle created the same edge
            Err(error) if is_unique_violation(&error) => {}
            Err(error) => return Err(error.into()),
        }
        txn.commit().await?;

        Ok(state)
    }

    /// Requests waiting on the actor's answer, newest first.
    pub async fn _pending_requests(
        &self,
        actor: &Actor,
    ) -> Result<Vec<IncomingRequest>, FollowsServiceError> {
        let requests = FollowRequest::find()
            .filter(FollowRequestColumn::FollowingId.eq(actor.id))
            .filter(FollowRequestColumn::Status.eq(FollowStatus::Pending))
            .order_by_desc(FollowRequestColumn::CreatedAt)
            .all(&self.db)
            .await?;

        let mut incoming = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(follower) = User::find_by_id(request.follower_id).one(&self.db).await? {
                incoming.push(IncomingRequest { request, follower });
            }
        }

        Ok(incoming)
    }

    /// Only the followed user can answer, so the request is looked up under
    /// the actor's id.
    pub async fn _handle_request(
        &self,
        actor: &Actor,
        follower_id: UserId,
        decision: FollowDecision,
    ) -> Result<FollowRequestModel, FollowsServiceError> {
        let request = FollowRequest::find_by_id((follower_id, actor.id))
            .one(&self.db)
            .await?
            .ok_or(FollowsServiceError::RequestNotFound)?;

        let mut request: FollowRequestActiveModel = request.into();
        request.status = Set(match decision {
            FollowDecision::Accept => FollowStatus::Accepted,
            FollowDecision::Decline => FollowStatus::Declined,
        });

        Ok(request.update(&self.db).await?)
    }

    pub async fn _followers(&self, user_id: UserId) -> Result<Vec<UserModel>, FollowsServiceError> {
        let edges = FollowRequest::find()
            .filter(FollowRequestColumn::FollowingId.eq(user_id))
            .filter(FollowRequestColumn::Status.eq(FollowStatus::Accepted))
            .all(&self.db)
            .await?;

        self.users_by_id(edges.into_iter().map(|edge| edge.follower_id))
            .await
    }

    pub async fn _following(&self, user_id: UserId) -> Result<Vec<UserModel>, FollowsServiceError> {
        let ids = followed_ids(&self.db, user_id).await?;
        self.users_by_id(ids).await
    }

    pub async fn _counts(&self, user_id: UserId) -> Result<FollowCounts, FollowsServiceError> {
        Ok(count_follows(&self.db, user_id).await?)
    }

    async fn users_by_id(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<Vec<UserModel>, FollowsServiceError> {
        let users = User::find()
            .filter(UserColumn::Id.is_in(ids))
            .order_by_asc(UserColumn::Username)
            .all(&self.db)
            .await?;
        Ok(users)
    }
}

#[zel_service(name = "follows")]
trait Follows {
    #[method(name = "toggle_follow")]
    async fn toggle_follow(&self, target: UserId) -> Result<FollowState, ResourceError>;

    #[method(name = "pending_requests")]
    async fn pending_requests(&self) -> Result<Vec<IncomingRequest>, ResourceError>;

    #[method(name = "handle_request")]
    async fn handle_request(
        &self,
        follower_id: UserId,
        decision: FollowDecision,
    ) -> Result<FollowRequestModel, ResourceError>;

    #[method(name = "followers")]
    async fn followers(&self, user_id: UserId) -> Result<Vec<UserModel>, ResourceError>;

    #[method(name = "following")]
    async fn following(&self, user_id: UserId) -> Result<Vec<UserModel>, ResourceError>;

    #[method(name = "counts")]
    async fn counts(&self, user_id: UserId) -> Result<FollowCounts, ResourceError>;
}

#[async_trait]
impl FollowsServer for FollowsService {
    async fn toggle_follow(
        &self,
        ctx: RequestContext,
        target: UserId,
    ) -> Result<FollowState, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._toggle_follow(&actor, target).await?)
    }

    async fn pending_requests(
        &self,
        ctx: RequestContext,
    ) -> Result<Vec<IncomingRequest>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._pending_requests(&actor).await?)
    }

    async fn handle_request(
        &self,
        ctx: RequestContext,
        follower_id: UserId,
        decision: FollowDecision,
    ) -> Result<FollowRequestModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._handle_request(&actor, follower_id, decision).await?)
    }

    async fn followers(
        &self,
        _ctx: RequestContext,
        user_id: UserId,
    ) -> Result<Vec<UserModel>, ResourceError> {
        Ok(self._followers(user_id).await?)
    }

    async fn following(
        &self,
        _ctx: RequestContext,
        user_id: UserId,
    ) -> Result<Vec<UserModel>, ResourceError> {
        Ok(self._following(user_id).await?)
    }

    async fn counts(
        &self,
        _ctx: RequestContext,
        user_id: UserId,
    ) -> Result<FollowCounts, ResourceError> {
        Ok(self._counts(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_db, register_user, set_public};

    async fn setup_test_service() -> FollowsService {
        FollowsService::new(create_test_db().await)
    }

    #[tokio::test]
    async fn test_follow_public_user_is_accepted() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;

        let state = service._toggle_follow(&alice, bob.id).await.unwrap();
        assert_eq!(state, FollowState::Following);

        let counts = service._counts(bob.id).await.unwrap();
        assert_eq!(counts.followers, 1);
        assert_eq!(counts.following, 0);

        let followers = service._followers(bob.id).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].id, alice.id);
    }

    #[tokio::test]
    async fn test_follow_private_user_is_pending_until_accepted() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        set_public(&service.db, bob.id, false).await;

        let state = service._toggle_follow(&alice, bob.id).await.unwrap();
        assert_eq!(state, FollowState::Pending);
        assert_eq!(service._counts(bob.id).await.unwrap().followers, 0);

        let pending = service._pending_requests(&bob).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].follower.id, alice.id);

        let answered = service
            ._handle_request(&bob, alice.id, FollowDecision::Accept)
            .await
            .unwrap();
        assert_eq!(answered.status, FollowStatus::Accepted);
        assert!(service._pending_requests(&bob).await.unwrap().is_empty());

        let following = service._following(alice.id).await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].id, bob.id);
    }

    #[tokio::test]
    async fn test_declined_request_is_kept_until_toggled_away() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        set_public(&service.db, bob.id, false).await;

        service._toggle_follow(&alice, bob.id).await.unwrap();
        service
            ._handle_request(&bob, alice.id, FollowDecision::Decline)
            .await
            .unwrap();

        assert_eq!(
            follow_status(&service.db, alice.id, bob.id).await.unwrap(),
            Some(FollowStatus::Declined)
        );
        assert_eq!(service._counts(bob.id).await.unwrap().followers, 0);

        let state = service._toggle_follow(&alice, bob.id).await.unwrap();
        assert_eq!(state, FollowState::NotFollowing);
        assert_eq!(follow_status(&service.db, alice.id, bob.id).await.unwrap(), None);

        let state = service._toggle_follow(&alice, bob.id).await.unwrap();
        assert_eq!(state, FollowState::Pending);
        assert_eq!(service._pending_requests(&bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_twice_unfollows() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;

        service._toggle_follow(&alice, bob.id).await.unwrap();
        let state = service._toggle_follow(&alice, bob.id).await.unwrap();

        assert_eq!(state, FollowState::NotFollowing);
        assert!(service._followers(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;

        let result = service._toggle_follow(&alice, alice.id).await;
        assert!(matches!(result, Err(FollowsServiceError::CannotFollowSelf)));
    }

    #[tokio::test]
    async fn test_follow_unknown_user_fails() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;

        let result = service._toggle_follow(&alice, UserId::new()).await;
        assert!(matches!(result, Err(FollowsServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_only_target_can_answer() {
        let service = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let carol = register_user(&service.db, "carol").await;
        set_public(&service.db, bob.id, false).await;

        service._toggle_follow(&alice, bob.id).await.unwrap();

        let result = service
            ._handle_request(&carol, alice.id, FollowDecision::Accept)
            .await;
        assert!(matches!(result, Err(FollowsServiceError::RequestNotFound)));
    }
}
