use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::{CommentId, PostId, UserId},
    moderation::{ModerationOutcome, SharedModerator},
    service::session::{Actor, Sessions},
};

pub const MAX_COMMENT_CHARS: usize = 1000;

/// Stored as the category of comments that passed moderation.
pub const SAFE_CATEGORY: &str = "Safe";

#[derive(Debug, Error)]
pub enum CommentsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("comment not found")]
    CommentNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("unauthorized: not comment author")]
    Unauthorized,

    #[error("comment must not be empty")]
    EmptyComment,

    #[error("comment is longer than {MAX_COMMENT_CHARS} characters")]
    CommentTooLong,

    #[error("comment was rejected by moderation: {0}")]
    Flagged(String),
}

impl From<CommentsServiceError> for ResourceError {
    fn from(error: CommentsServiceError) -> Self {
        match error {
            CommentsServiceError::DbError(error) => ResourceError::infra(error),
            _ => ResourceError::app(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    pub comment: CommentModel,
    pub author: UserModel,
}

/// Moderation columns of a comment row.
struct Verdict {
    is_flagged: Option<bool>,
    flag_category: Option<String>,
    moderated_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CommentsService {
    db: DatabaseConnection,
    sessions: Sessions,
    moderator: SharedModerator,
}

impl CommentsService {
    pub fn new(db: DatabaseConnection, moderator: SharedModerator) -> Self {
        let sessions = Sessions::new(db.clone());
        Self {
            db,
            sessions,
            moderator,
        }
    }

    pub async fn _add_comment(
        &self,
        actor: &Actor,
        post_id: PostId,
        content: String,
    ) -> Result<CommentModel, CommentsServiceError> {
        let content = validate(content)?;

        if Post::find_by_id(post_id).one(&self.db).await?.is_none() {
            return Err(CommentsServiceError::PostNotFound);
        }

        let verdict = self.moderate(&content).await?;

        let comment = CommentActiveModel {
            id: Set(CommentId::new()),
            post_id: Set(post_id),
            user_id: Set(actor.id),
            content: Set(content),
            created_at: Set(Utc::now()),
            date_modified: Set(None),
            is_flagged: Set(verdict.is_flagged),
            flag_category: Set(verdict.flag_category),
            moderated_at: Set(verdict.moderated_at),
        };

        let comment = Comment::insert(comment).exec_with_returning(&self.db).await?;
        debug!(comment_id = %comment.id, %post_id, "comment added");
        Ok(comment)
    }

    pub async fn _get_comment(&self, comment_id: CommentId) -> Result<CommentModel, CommentsServiceError> {
        Comment::find_by_id(comment_id)
            .one(&self.db)
            .await?
            .ok_or(CommentsServiceError::CommentNotFound)
    }

    pub async fn _edit_comment(
        &self,
        actor: &Actor,
        comment_id: CommentId,
        content: String,
    ) -> Result<CommentModel, CommentsServiceError> {
        let comment = self._get_comment(comment_id).await?;
        if !actor.can_manage(comment.user_id) {
            return Err(CommentsServiceError::Unauthorized);
        }

        let content = validate(content)?;
        let verdict = self.moderate(&content).await?;

        let mut comment: CommentActiveModel = comment.into();
        comment.content = Set(content);
        comment.date_modified = Set(Some(Utc::now()));
        comment.is_flagged = Set(verdict.is_flagged);
        comment.flag_category = Set(verdict.flag_category);
        comment.moderated_at = Set(verdict.moderated_at);

        Ok(comment.update(&self.db).await?)
    }

    pub async fn _delete_comment(
        &self,
        actor: &Actor,
        comment_id: CommentId,
    ) -> Result<(), CommentsServiceError> {
        let comment = self._get_comment(comment_id).await?;
        if !actor.can_manage(comment.user_id) {
            return Err(CommentsServiceError::Unauthorized);
        }

        Comment::delete_by_id(comment.id).exec(&self.db).await?;
        Ok(())
    }

    /// Administrator view of everything a user has commented, newest first.
    pub async fn _comments_by(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<Vec<CommentModel>, CommentsServiceError> {
        if !actor.is_admin() {
            return Err(CommentsServiceError::Unauthorized);
        }

        let comments = Comment::find()
            .filter(CommentColumn::UserId.eq(user_id))
            .order_by_desc(CommentColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(comments)
    }

    async fn moderate(&self, content: &str) -> Result<Verdict, CommentsServiceError> {
        match self.moderator.check_content(content).await {
            ModerationOutcome::Clean => Ok(Verdict {
                is_flagged: Some(false),
                flag_category: Some(SAFE_CATEGORY.to_string()),
                moderated_at: Some(Utc::now()),
            }),
            ModerationOutcome::Flagged { category } => Err(CommentsServiceError::Flagged(category)),
            ModerationOutcome::Unavailable { .. } => Ok(Verdict {
                is_flagged: None,
                flag_category: None,
                moderated_at: None,
            }),
        }
    }
}

fn validate(content: String) -> Result<String, CommentsServiceError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CommentsServiceError::EmptyComment);
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(CommentsServiceError::CommentTooLong);
    }
    Ok(content.to_string())
}

#[zel_service(name = "comments")]
trait Comments {
    #[method(name = "add_comment")]
    async fn add_comment(&self, post_id: PostId, content: String) -> Result<CommentModel, ResourceError>;

    #[method(name = "edit_comment")]
    async fn edit_comment(
        &self,
        comment_id: CommentId,
        content: String,
    ) -> Result<CommentModel, ResourceError>;

    #[method(name = "delete_comment")]
    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), ResourceError>;

    #[method(name = "comments_by")]
    async fn comments_by(&self, user_id: UserId) -> Result<Vec<CommentModel>, ResourceError>;
}

#[async_trait]
impl CommentsServer for CommentsService {
    async fn add_comment(
        &self,
        ctx: RequestContext,
        post_id: PostId,
        content: String,
    ) -> Result<CommentModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._add_comment(&actor, post_id, content).await?)
    }

    async fn edit_comment(
        &self,
        ctx: RequestContext,
        comment_id: CommentId,
        content: String,
    ) -> Result<CommentModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._edit_comment(&actor, comment_id, content).await?)
    }

    async fn delete_comment(
        &self,
        ctx: RequestContext,
        comment_id: CommentId,
    ) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._delete_comment(&actor, comment_id).await?)
    }

    async fn comments_by(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CommentModel>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._comments_by(&actor, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        moderation::testing::{ScriptedModerator, BANNED_WORD},
        service::posts::PostsService,
        test_utils::{create_test_db, register_admin, register_user},
    };

    async fn setup_test_service() -> (CommentsService, PostsService) {
        let db = create_test_db().await;
        let moderator = ScriptedModerator::shared();
        (
            CommentsService::new(db.clone(), moderator.clone()),
            PostsService::new(db, moderator, 4),
        )
    }

    async fn create_post(posts: &PostsService, actor: &Actor) -> PostId {
        posts
            ._create_post(actor, Some("a post".to_string()), None, None)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_clean_comment_is_marked_safe() {
        let (service, posts) = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let post_id = create_post(&posts, &alice).await;

        let comment = service
            ._add_comment(&alice, post_id, "  nice post  ".to_string())
            .await
            .unwrap();

        assert_eq!(comment.content, "nice post");
        assert_eq!(comment.is_flagged, Some(false));
        assert_eq!(comment.flag_category.as_deref(), Some(SAFE_CATEGORY));
        assert!(comment.moderated_at.is_some());
        assert_eq!(comment.date_modified, None);
    }

    #[tokio::test]
    async fn test_flagged_comment_is_rejected() {
        let (service, posts) = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let post_id = create_post(&posts, &alice).await;

        let result = service
            ._add_comment(&alice, post_id, format!("{BANNED_WORD}!"))
            .await;

        assert!(matches!(result, Err(CommentsServiceError::Flagged(_))));
        assert_eq!(Comment::find().count(&service.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comment_saved_unmoderated_when_moderation_is_down() {
        let db = create_test_db().await;
        let service = CommentsService::new(db.clone(), ScriptedModerator::offline());
        let posts = PostsService::new(db, ScriptedModerator::offline(), 4);
        let alice = register_user(&service.db, "alice").await;
        let post_id = create_post(&posts, &alice).await;

        let comment = service
            ._add_comment(&alice, post_id, "hello".to_string())
            .await
            .unwrap();

        assert_eq!(comment.is_flagged, None);
        assert_eq!(comment.flag_category, None);
        assert_eq!(comment.moderated_at, None);
    }

    #[tokio::test]
    async fn test_comment_validation() {
        let (service, posts) = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let post_id = create_post(&posts, &alice).await;

        assert!(matches!(
            service._add_comment(&alice, post_id, "   ".to_string()).await,
            Err(CommentsServiceError::EmptyComment)
        ));
        assert!(matches!(
            service
                ._add_comment(&alice, post_id, "x".repeat(MAX_COMMENT_CHARS + 1))
                .await,
            Err(CommentsServiceError::CommentTooLong)
        ));
        assert!(service
            ._add_comment(&alice, post_id, "x".repeat(MAX_COMMENT_CHARS))
            .await
            .is_ok());
        assert!(matches!(
            service._add_comment(&alice, PostId::new(), "hi".to_string()).await,
            Err(CommentsServiceError::PostNotFound)
        ));
    }

    #[tokio::test]
    async fn test_edit_comment_sets_date_modified() {
        let (service, posts) = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let post_id = create_post(&posts, &alice).await;
        let comment = service
            ._add_comment(&bob, post_id, "first take".to_string())
            .await
            .unwrap();

        assert!(matches!(
            service
                ._edit_comment(&alice, comment.id, "not yours".to_string())
                .await,
            Err(CommentsServiceError::Unauthorized)
        ));

        let flagged = service
            ._edit_comment(&bob, comment.id, BANNED_WORD.to_string())
            .await;
        assert!(matches!(flagged, Err(CommentsServiceError::Flagged(_))));
        assert_eq!(service._get_comment(comment.id).await.unwrap(), comment);

        let edited = service
            ._edit_comment(&bob, comment.id, "second take".to_string())
            .await
            .unwrap();
        assert_eq!(edited.content, "second take");
        assert!(edited.date_modified.is_some());
        assert_eq!(edited.created_at, comment.created_at);
    }

    #[tokio::test]
    async fn test_delete_comment_by_author_or_admin() {
        let (service, posts) = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let bob = register_user(&service.db, "bob").await;
        let admin = register_admin(&service.db, "root").await;
        let post_id = create_post(&posts, &alice).await;

        let first = service
            ._add_comment(&bob, post_id, "one".to_string())
            .await
            .unwrap();
        let second = service
            ._add_comment(&bob, post_id, "two".to_string())
            .await
            .unwrap();

        assert!(matches!(
            service._delete_comment(&alice, first.id).await,
            Err(CommentsServiceError::Unauthorized)
        ));
        service._delete_comment(&bob, first.id).await.unwrap();
        service._delete_comment(&admin, second.id).await.unwrap();

        assert_eq!(Comment::find().count(&service.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comments_by_is_admin_only() {
        let (service, posts) = setup_test_service().await;
        let alice = register_user(&service.db, "alice").await;
        let admin = register_admin(&service.db, "root").await;
        let post_id = create_post(&posts, &alice).await;
        service
            ._add_comment(&alice, post_id, "mine".to_string())
            .await
            .unwrap();

        assert!(matches!(
            service._comments_by(&alice, alice.id).await,
            Err(CommentsServiceError::Unauthorized)
        ));
        assert_eq!(service._comments_by(&admin, alice.id).await.unwrap().len(), 1);
    }
}
