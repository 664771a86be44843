use chrono::Utc;
use iroh::PublicKey;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::{CollectionId, UserId},
    models::cascade,
    service::{
        content::{validate_image_url, ContentError},
        follows::{count_follows, follow_status},
        session::{Actor, Sessions},
    },
};

#[derive(Debug, Error)]
pub enum UsersServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("username or email is already taken")]
    UsernameTaken,

    #[error("this node is already registered")]
    AlreadyRegistered,

    #[error("username must not be blank")]
    InvalidUsername,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("invalid avatar: {0}")]
    InvalidAvatar(#[from] ContentError),

    #[error("unauthorized: administrators only")]
    Unauthorized,

    #[error("administrators cannot delete their own account")]
    CannotDeleteSelf,
}

impl From<UsersServiceError> for ResourceError {
    fn from(error: UsersServiceError) -> Self {
        match error {
            UsersServiceError::DbError(error) => ResourceError::infra(error),
            _ => ResourceError::app(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub avatar_url: Option<String>,
}

/// A profile as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub user: UserModel,
    pub is_owner: bool,
    pub is_following: bool,
    pub is_pending: bool,
    pub show_full_profile: bool,
    pub followers: u64,
    pub following: u64,
    /// Empty unless `show_full_profile` is set.
    pub posts: Vec<PostModel>,
}

#[derive(Clone)]
pub struct UsersService {
    db: DatabaseConnection,
    sessions: Sessions,
}

impl UsersService {
    pub fn new(db: DatabaseConnection) -> Self {
        let sessions = Sessions::new(db.clone());
        Self { db, sessions }
    }

    /// Creates the account, binds the node to it and creates its default
    /// collection in one transaction.
    pub async fn _register(
        &self,
        node_id: PublicKey,
        username: String,
        email: String,
    ) -> Result<UserModel, UsersServiceError> {
        let username = username.trim().to_string();
        let email = email.trim().to_string();
        if username.is_empty() {
            return Err(UsersServiceError::InvalidUsername);
        }
        if !email.contains('@') {
            return Err(UsersServiceError::InvalidEmail);
        }

        let node_bytes = node_id.as_bytes().to_vec();
        let txn = self.db.begin().await?;

        if Identity::find_by_id(node_bytes.clone()).one(&txn).await?.is_some() {
            return Err(UsersServiceError::AlreadyRegistered);
        }

        let taken = User::find()
            .filter(
                Condition::any()
                    .add(UserColumn::Username.eq(username.as_str()))
                    .add(UserColumn::Email.eq(email.as_str())),
            )
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(UsersServiceError::UsernameTaken);
        }

        let now = Utc::now();
        let user = UserActiveModel {
            id: Set(UserId::new()),
            username: Set(username),
            email: Set(email),
            full_name: Set(None),
            description: Set(None),
            avatar_url: Set(None),
            is_public: Set(true),
            role: Set(Role::User),
            created_at: Set(now),
        };
        let user = User::insert(user).exec_with_returning(&txn).await?;

        let identity = IdentityActiveModel {
            node_id: Set(node_bytes),
            user_id: Set(user.id),
        };
        Identity::insert(identity).exec(&txn).await?;

        let default_collection = CollectionActiveModel {
            id: Set(CollectionId::new()),
            user_id: Set(user.id),
            name: Set(DEFAULT_COLLECTION_NAME.to_string()),
            is_default: Set(true),
            created_at: Set(now),
        };
        Collection::insert(default_collection).exec(&txn).await?;

        txn.commit().await?;

        info!(user_id = %user.id, username = %user.username, "registered user");
        Ok(user)
    }

    pub async fn _get_user(&self, user_id: UserId) -> Result<UserModel, UsersServiceError> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(UsersServiceError::UserNotFound)
    }

    /// Blank strings clear the field.
    pub async fn _update_profile(
        &self,
        actor: &Actor,
        update: ProfileUpdate,
    ) -> Result<UserModel, UsersServiceError> {
        let user = self._get_user(actor.id).await?;

        let avatar_url = blank_to_none(update.avatar_url);
        if let Some(url) = &avatar_url {
            validate_image_url(url)?;
        }

        let mut user: UserActiveModel = user.into();
        user.full_name = Set(blank_to_none(update.full_name));
        user.description = Set(blank_to_none(update.description));
        user.is_public = Set(update.is_public);
        user.avatar_url = Set(avatar_url);

        Ok(user.update(&self.db).await?)
    }

    pub async fn _profile(
        &self,
        viewer: Option<&Actor>,
        user_id: UserId,
    ) -> Result<ProfileView, UsersServiceError> {
        let user = self._get_user(user_id).await?;

        let is_owner = viewer.is_some_and(|viewer| viewer.id == user.id);
        let status = match viewer {
            Some(viewer) if !is_owner => follow_status(&self.db, viewer.id, user.id).await?,
            _ => None,
        };
        let is_following = status == Some(FollowStatus::Accepted);
        let is_pending = status == Some(FollowStatus::Pending);
        let show_full_profile = user.is_public || is_owner || is_following;

        let counts = count_follows(&self.db, user.id).await?;

        let posts = if show_full_profile {
            Post::find()
                .filter(PostColumn::AuthorId.eq(user.id))
                .order_by_desc(PostColumn::CreatedAt)
                .all(&self.db)
                .await?
        } else {
            Vec::new()
        };

        Ok(ProfileView {
            user,
            is_owner,
            is_following,
            is_pending,
            show_full_profile,
            followers: counts.followers,
            following: counts.following,
            posts,
        })
    }

    /// Matches full name or username. A blank query matches nobody.
    pub async fn _search(&self, query: &str) -> Result<Vec<UserModel>, UsersServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let users = User::find()
            .filter(
                Condition::any()
                    .add(UserColumn::FullName.contains(query))
                    .add(UserColumn::Username.contains(query)),
            )
            .order_by_asc(UserColumn::Username)
            .all(&self.db)
            .await?;

        Ok(users)
    }

    pub async fn _list_users(&self, actor: &Actor) -> Result<Vec<UserModel>, UsersServiceError> {
        require_admin(actor)?;

        let users = User::find()
            .order_by_asc(UserColumn::Username)
            .all(&self.db)
            .await?;
        Ok(users)
    }

    pub async fn _delete_user(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<(), UsersServiceError> {
        require_admin(actor)?;
        if actor.id == user_id {
            return Err(UsersServiceError::CannotDeleteSelf);
        }

        let txn = self.db.begin().await?;
        if User::find_by_id(user_id).one(&txn).await?.is_none() {
            return Err(UsersServiceError::UserNotFound);
        }
        cascade::delete_user_tree(&txn, user_id).await?;
        txn.commit().await?;

        info!(admin = %actor.id, %user_id, "user removed by administrator");
        Ok(())
    }

    /// Returns false when the user already was an administrator.
    pub async fn _promote_to_admin(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<bool, UsersServiceError> {
        require_admin(actor)?;
        let user = self._get_user(user_id).await?;
        self.promote(user).await
    }

    /// Startup hook for the configured initial administrator.
    pub async fn _ensure_admin_email(&self, email: &str) -> Result<bool, UsersServiceError> {
        let user = User::find()
            .filter(UserColumn::Email.eq(email.trim()))
            .one(&self.db)
            .await?;

        match user {
            Some(user) => self.promote(user).await,
            None => {
                warn!(email, "initial administrator has not registered yet");
                Ok(false)
            }
        }
    }

    async fn promote(&self, user: UserModel) -> Result<bool, UsersServiceError> {
        if user.is_admin() {
            return Ok(false);
        }

        let user_id = user.id;
        let mut user: UserActiveModel = user.into();
        user.role = Set(Role::Administrator);
        user.update(&self.db).await?;

        info!(%user_id, "promoted to administrator");
        Ok(true)
    }
}

fn require_admin(actor: &Actor) -> Result<(), UsersServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(UsersServiceError::Unauthorized)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[zel_service(name = "users")]
trait Users {
    #[doc = "Create an account bound to the calling node"]
    #[method(name = "register")]
    async fn register(&self, username: String, email: String) -> Result<UserModel, ResourceError>;

    #[doc = "The account bound to the calling node, if any"]
    #[method(name = "whoami")]
    async fn whoami(&self) -> Result<Option<UserModel>, ResourceError>;

    #[method(name = "update_profile")]
    async fn update_profile(&self, update: ProfileUpdate) -> Result<UserModel, ResourceError>;

    #[method(name = "profile")]
    async fn profile(&self, user_id: UserId) -> Result<ProfileView, ResourceError>;

    #[method(name = "search")]
    async fn search(&self, query: String) -> Result<Vec<UserModel>, ResourceError>;

    #[method(name = "list_users")]
    async fn list_users(&self) -> Result<Vec<UserModel>, ResourceError>;

    #[method(name = "delete_user")]
    async fn delete_user(&self, user_id: UserId) -> Result<(), ResourceError>;

    #[method(name = "promote_to_admin")]
    async fn promote_to_admin(&self, user_id: UserId) -> Result<bool, ResourceError>;
}

#[async_trait]
impl UsersServer for UsersService {
    async fn register(
        &self,
        ctx: RequestContext,
        username: String,
        email: String,
    ) -> Result<UserModel, ResourceError> {
        let node_id = ctx.connection().remote_id();
        Ok(self._register(node_id, username, email).await?)
    }

    async fn whoami(&self, ctx: RequestContext) -> Result<Option<UserModel>, ResourceError> {
        let Some(actor) = self.sessions.viewer(&ctx).await? else {
            return Ok(None);
        };
        Ok(Some(self._get_user(actor.id).await?))
    }

    async fn update_profile(
        &self,
        ctx: RequestContext,
        update: ProfileUpdate,
    ) -> Result<UserModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._update_profile(&actor, update).await?)
    }

    async fn profile(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<ProfileView, ResourceError> {
        let viewer = self.sessions.viewer(&ctx).await?;
        Ok(self._profile(viewer.as_ref(), user_id).await?)
    }

    async fn search(
        &self,
        _ctx: RequestContext,
        query: String,
    ) -> Result<Vec<UserModel>, ResourceError> {
        Ok(self._search(&query).await?)
    }

    async fn list_users(&self, ctx: RequestContext) -> Result<Vec<UserModel>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._list_users(&actor).await?)
    }

    async fn delete_user(&self, ctx: RequestContext, user_id: UserId) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._delete_user(&actor, user_id).await?)
    }

    async fn promote_to_admin(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<bool, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._promote_to_admin(&actor, user_id).await?)
    }
}
