use std::collections::HashMap;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::{GroupId, MessageId, UserId},
    moderation::{MessageSafety, SharedModerator},
    service::{
        content::{ContentBody, ContentError, MediaEdit},
        groups::membership_status,
        session::{Actor, Sessions},
    },
};

#[derive(Debug, Error)]
pub enum MessagesServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("message not found")]
    MessageNotFound,

    #[error("group not found")]
    GroupNotFound,

    #[error("you must be an accepted member of this group")]
    NotMember,

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    InvalidContent(#[from] ContentError),
}

impl From<MessagesServiceError> for ResourceError {
    fn from(error: MessagesServiceError) -> Self {
        match error {
            MessagesServiceError::DbError(error) => ResourceError::infra(error),
            _ => ResourceError::app(error),
        }
    }
}

/// `author` is `None` once the author's account is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithAuthor {
    pub message: MessageModel,
    pub author: Option<UserModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageEdit {
    pub text: Option<String>,
    pub image: MediaEdit,
    pub video: MediaEdit,
}

pub async fn with_authors<C: ConnectionTrait>(
    db: &C,
    messages: Vec<MessageModel>,
) -> Result<Vec<MessageWithAuthor>, DbErr> {
    let author_ids: Vec<UserId> = messages.iter().filter_map(|m| m.user_id).collect();
    let authors: HashMap<UserId, UserModel> = User::find()
        .filter(UserColumn::Id.is_in(author_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    Ok(messages
        .into_iter()
        .map(|message| {
            let author = message.user_id.and_then(|id| authors.get(&id).cloned());
            MessageWithAuthor { message, author }
        })
        .collect())
}

#[derive(Clone)]
pub struct MessagesService {
    db: DatabaseConnection,
    sessions: Sessions,
    moderator: SharedModerator,
}

impl MessagesService {
    pub fn new(db: DatabaseConnection, moderator: SharedModerator) -> Self {
        let sessions = Sessions::new(db.clone());
        Self {
            db,
            sessions,
            moderator,
        }
    }

    /// Unsafe messages are kept but reported straight away.
    pub async fn _send(
        &self,
        actor: &Actor,
        group_id: GroupId,
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<MessageModel, MessagesServiceError> {
        self.require_participant(actor, group_id).await?;

        let body = ContentBody::new(text, image_url, video_url)?;
        let safety = self.classify(body.text.as_deref()).await;

        let message = MessageActiveModel {
            id: Set(MessageId::new()),
            group_id: Set(group_id),
            user_id: Set(Some(actor.id)),
            text_content: Set(body.text),
            image_url: Set(body.image_url),
            video_url: Set(body.video_url),
            created_at: Set(Utc::now()),
            edited_at: Set(None),
            is_safe: Set(safety.as_flag()),
            is_reported: Set(safety == MessageSafety::Unsafe),
        };

        let message = Message::insert(message).exec_with_returning(&self.db).await?;
        if message.is_reported {
            warn!(message_id = %message.id, %group_id, "unsafe message reported automatically");
        } else {
            debug!(message_id = %message.id, %group_id, "message sent");
        }
        Ok(message)
    }

    pub async fn _get_message(
        &self,
        message_id: MessageId,
    ) -> Result<MessageModel, MessagesServiceError> {
        Message::find_by_id(message_id)
            .one(&self.db)
            .await?
            .ok_or(MessagesServiceError::MessageNotFound)
    }

    pub async fn _edit(
        &self,
        actor: &Actor,
        message_id: MessageId,
        edit: MessageEdit,
    ) -> Result<MessageModel, MessagesServiceError> {
        let message = self._get_message(message_id).await?;
        if !can_change(actor, &message) {
            return Err(MessagesServiceError::Unauthorized);
        }

        let image_url = edit.image.apply(message.image_url.clone());
        let video_url = edit.video.apply(message.video_url.clone());
        let body = ContentBody::new(edit.text, image_url, video_url)?;
        let safety = self.classify(body.text.as_deref()).await;
        let reported = message.is_reported || safety == MessageSafety::Unsafe;

        let mut message: MessageActiveModel = message.into();
        message.text_content = Set(body.text);
        message.image_url = Set(body.image_url);
        message.video_url = Set(body.video_url);
        message.edited_at = Set(Some(Utc::now()));
        message.is_safe = Set(safety.as_flag());
        message.is_reported = Set(reported);

        Ok(message.update(&self.db).await?)
    }

    pub async fn _delete(
        &self,
        actor: &Actor,
        message_id: MessageId,
    ) -> Result<(), MessagesServiceError> {
        let message = self._get_message(message_id).await?;
        if !can_change(actor, &message) {
            return Err(MessagesServiceError::Unauthorized);
        }

        Message::delete_by_id(message.id).exec(&self.db).await?;
        info!(%message_id, by = %actor.id, "message deleted");
        Ok(())
    }

    /// Oldest first.
    pub async fn _list_for_group(
        &self,
        actor: &Actor,
        group_id: GroupId,
    ) -> Result<Vec<MessageWithAuthor>, MessagesServiceError> {
        self.require_participant(actor, group_id).await?;

        let messages = Message::find()
            .filter(MessageColumn::GroupId.eq(group_id))
            .order_by_asc(MessageColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(with_authors(&self.db, messages).await?)
    }

    pub async fn _list_all(
        &self,
        actor: &Actor,
    ) -> Result<Vec<MessageWithAuthor>, MessagesServiceError> {
        if !actor.is_admin() {
            return Err(MessagesServiceError::Unauthorized);
        }

        let messages = Message::find()
            .order_by_desc(MessageColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(with_authors(&self.db, messages).await?)
    }

    pub async fn _get(
        &self,
        actor: &Actor,
        message_id: MessageId,
    ) -> Result<MessageWithAuthor, MessagesServiceError> {
        if !actor.is_admin() {
            return Err(MessagesServiceError::Unauthorized);
        }

        let message = self._get_message(message_id).await?;
        let mut found = with_authors(&self.db, vec![message]).await?;
        found.pop().ok_or(MessagesServiceError::MessageNotFound)
    }

    pub async fn _report(
        &self,
        actor: &Actor,
        message_id: MessageId,
    ) -> Result<MessageModel, MessagesServiceError> {
        let message = self._get_message(message_id).await?;
        self.require_participant(actor, message.group_id).await?;

        if message.is_reported {
            return Ok(message);
        }

        let mut message: MessageActiveModel = message.into();
        message.is_reported = Set(true);
        let message = message.update(&self.db).await?;

        info!(message_id = %message.id, by = %actor.id, "message reported");
        Ok(message)
    }

    /// Reported messages of a group, newest first.
    pub async fn _reported(
        &self,
        actor: &Actor,
        group_id: GroupId,
    ) -> Result<Vec<MessageWithAuthor>, MessagesServiceError> {
        let group = Group::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or(MessagesServiceError::GroupNotFound)?;
        if !actor.can_manage(group.moderator_id) {
            return Err(MessagesServiceError::Unauthorized);
        }

        let messages = Message::find()
            .filter(MessageColumn::GroupId.eq(group.id))
            .filter(MessageColumn::IsReported.eq(true))
            .order_by_desc(MessageColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(with_authors(&self.db, messages).await?)
    }

    pub async fn _messages_by(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<Vec<MessageModel>, MessagesServiceError> {
        if !actor.is_admin() {
            return Err(MessagesServiceError::Unauthorized);
        }

        Ok(Message::find()
            .filter(MessageColumn::UserId.eq(user_id))
            .order_by_desc(MessageColumn::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Active members and administrators may read and write a group.
    async fn require_participant(
        &self,
        actor: &Actor,
        group_id: GroupId,
    ) -> Result<(), MessagesServiceError> {
        let exists = Group::find_by_id(group_id).count(&self.db).await? > 0;
        if !exists {
            return Err(MessagesServiceError::GroupNotFound);
        }
        if actor.is_admin() {
            return Ok(());
        }

        match membership_status(&self.db, group_id, actor.id).await? {
            Some(status) if status.is_active() => Ok(()),
            _ => Err(MessagesServiceError::NotMember),
        }
    }

    async fn classify(&self, text: Option<&str>) -> MessageSafety {
        match text {
            Some(text) => self.moderator.classify_message(text).await,
            None => MessageSafety::Unavailable,
        }
    }
}

fn can_change(actor: &Actor, message: &MessageModel) -> bool {
    actor.is_admin() || message.user_id == Some(actor.id)
}

#[zel_service(name = "messages")]
trait Messages {
    #[method(name = "send")]
    async fn send(
        &self,
        group_id: GroupId,
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<MessageModel, ResourceError>;

    #[method(name = "edit")]
    async fn edit(&self, message_id: MessageId, edit: MessageEdit) -> Result<MessageModel, ResourceError>;

    #[method(name = "delete")]
    async fn delete(&self, message_id: MessageId) -> Result<(), ResourceError>;

    #[method(name = "list_for_group")]
    async fn list_for_group(&self, group_id: GroupId) -> Result<Vec<MessageWithAuthor>, ResourceError>;

    #[method(name = "list_all")]
    async fn list_all(&self) -> Result<Vec<MessageWithAuthor>, ResourceError>;

    #[method(name = "get")]
    async fn get(&self, message_id: MessageId) -> Result<MessageWithAuthor, ResourceError>;

    #[method(name = "report")]
    async fn report(&self, message_id: MessageId) -> Result<MessageModel, ResourceError>;

    #[method(name = "reported")]
    async fn reported(&self, group_id: GroupId) -> Result<Vec<MessageWithAuthor>, ResourceError>;

    #[method(name = "messages_by")]
    async fn messages_by(&self, user_id: UserId) -> Result<Vec<MessageModel>, ResourceError>;
}

#[async_trait]
impl MessagesServer for MessagesService {
    async fn send(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<MessageModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self
            ._send(&actor, group_id, text, image_url, video_url)
            .await?)
    }

    async fn edit(
        &self,
        ctx: RequestContext,
        message_id: MessageId,
        edit: MessageEdit,
    ) -> Result<MessageModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._edit(&actor, message_id, edit).await?)
    }

    async fn delete(&self, ctx: RequestContext, message_id: MessageId) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._delete(&actor, message_id).await?)
    }

    async fn list_for_group(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
    ) -> Result<Vec<MessageWithAuthor>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._list_for_group(&actor, group_id).await?)
    }

    async fn list_all(&self, ctx: RequestContext) -> Result<Vec<MessageWithAuthor>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._list_all(&actor).await?)
    }

    async fn get(
        &self,
        ctx: RequestContext,
        message_id: MessageId,
    ) -> Result<MessageWithAuthor, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._get(&actor, message_id).await?)
    }

    async fn report(
        &self,
        ctx: RequestContext,
        message_id: MessageId,
    ) -> Result<MessageModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._report(&actor, message_id).await?)
    }

    async fn reported(
        &self,
        ctx: RequestContext,
        group_id: GroupId,
    ) -> Result<Vec<MessageWithAuthor>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._reported(&actor, group_id).await?)
    }

    async fn messages_by(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<Vec<MessageModel>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._messages_by(&actor, user_id).await?)
    }
}
