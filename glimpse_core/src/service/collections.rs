use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::{CollectionId, PostId, UserId},
    models::{cascade, is_unique_violation},
    service::session::{Actor, Sessions},
};

pub const MAX_COLLECTION_NAME_CHARS: usize = 30;

#[derive(Debug, Error)]
pub enum CollectionsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("collection not found")]
    CollectionNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("unauthorized: not collection owner")]
    Unauthorized,

    #[error("collection name must be 1 to {MAX_COLLECTION_NAME_CHARS} characters")]
    InvalidName,

    #[error("you already have a collection with this name")]
    DuplicateName,

    #[error("the default collection cannot be renamed or deleted")]
    DefaultCollectionLocked,
}

impl From<CollectionsServiceError> for ResourceError {
    fn from(error: CollectionsServiceError) -> Self {
        match error {
            CollectionsServiceError::DbError(error) => ResourceError::infra(error),
            CollectionsServiceError::CollectionNotFound
            | CollectionsServiceError::PostNotFound
            | CollectionsServiceError::Unauthorized
            | CollectionsServiceError::InvalidName
            | CollectionsServiceError::DuplicateName
            | CollectionsServiceError::DefaultCollectionLocked => ResourceError::app(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPost {
    pub post: PostModel,
    pub author: UserModel,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDetails {
    pub collection: CollectionModel,
    /// Most recently saved first
    pub posts: Vec<SavedPost>,
}

#[derive(Clone)]
pub struct CollectionsService {
    db: DatabaseConnection,
    sessions: Sessions,
}

impl CollectionsService {
    pub fn new(db: DatabaseConnection) -> Self {
        let sessions = Sessions::new(db.clone());
        Self { db, sessions }
    }

    /// Default collection first, then newest first.
    pub async fn _list(&self, actor: &Actor) -> Result<Vec<CollectionModel>, CollectionsServiceError> {
        let collections = Collection::find()
            .filter(CollectionColumn::UserId.eq(actor.id))
            .order_by_desc(CollectionColumn::IsDefault)
            .order_by_desc(CollectionColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(collections)
    }

    pub async fn _show(
        &self,
        actor: &Actor,
        collection_id: CollectionId,
    ) -> Result<CollectionDetails, CollectionsServiceError> {
        let collection = self.managed_collection(actor, collection_id).await?;

        let saved: Vec<(DateTime<Utc>, PostModel)> = PostCollection::find()
            .filter(PostCollectionColumn::CollectionId.eq(collection.id))
            .order_by_desc(PostCollectionColumn::AddedAt)
            .find_also_related(Post)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(link, post)| post.map(|post| (link.added_at, post)))
            .collect();

        let author_ids: Vec<UserId> = saved.iter().map(|(_, post)| post.author_id).collect();
        let authors: HashMap<UserId, UserModel> = User::find()
            .filter(UserColumn::Id.is_in(author_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let posts = saved
            .into_iter()
            .filter_map(|(added_at, post)| {
                let author = authors.get(&post.author_id)?.clone();
                Some(SavedPost {
                    post,
                    author,
                    added_at,
                })
            })
            .collect();

        Ok(CollectionDetails { collection, posts })
    }

    /// Creates a collection and optionally saves `save_post` into it.
    pub async fn _create(
        &self,
        actor: &Actor,
        name: String,
        save_post: Option<PostId>,
    ) -> Result<CollectionModel, CollectionsServiceError> {
        let name = validate_name(&name)?;

        if let Some(post_id) = save_post {
            if Post::find_by_id(post_id).one(&self.db).await?.is_none() {
                return Err(CollectionsServiceError::PostNotFound);
            }
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        if name_taken(&txn, actor.id, &name).await? {
            return Err(CollectionsServiceError::DuplicateName);
        }

        let collection = CollectionActiveModel {
            id: Set(CollectionId::new()),
            user_id: Set(actor.id),
            name: Set(name),
            is_default: Set(false),
            created_at: Set(now),
        };
        let collection = Collection::insert(collection)
            .exec_with_returning(&txn)
            .await
            .map_err(duplicate_name)?;

        if let Some(post_id) = save_post {
            let link = PostCollectionActiveModel {
                post_id: Set(post_id),
                collection_id: Set(collection.id),
                added_at: Set(now),
            };
            PostCollection::insert(link).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(collection)
    }

    pub async fn _rename(
        &self,
        actor: &Actor,
        collection_id: CollectionId,
        name: String,
    ) -> Result<CollectionModel, CollectionsServiceError> {
        let collection = self.managed_collection(actor, collection_id).await?;
        if collection.is_default {
            return Err(CollectionsServiceError::DefaultCollectionLocked);
        }

        let name = validate_name(&name)?;
        if name == collection.name {
            return Ok(collection);
        }
        if name_taken(&self.db, collection.user_id, &name).await? {
            return Err(CollectionsServiceError::DuplicateName);
        }

        let mut collection: CollectionActiveModel = collection.into();
        collection.name = Set(name);
        collection
            .update(&self.db)
            .await
            .map_err(duplicate_name)
    }

    pub async fn _delete(
        &self,
        actor: &Actor,
        collection_id: CollectionId,
    ) -> Result<(), CollectionsServiceError> {
        let collection = self.managed_collection(actor, collection_id).await?;
        if collection.is_default {
            return Err(CollectionsServiceError::DefaultCollectionLocked);
        }

        let txn = self.db.begin().await?;
        cascade::delete_collection_tree(&txn, collection.id).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn _is_name_available(
        &self,
        actor: &Actor,
        name: &str,
    ) -> Result<bool, CollectionsServiceError> {
        let Ok(name) = validate_name(name) else {
            return Ok(false);
        };
        Ok(!name_taken(&self.db, actor.id, &name).await?)
    }

    /// Returns whether the post is saved in the collection afterwards.
    pub async fn _toggle_post(
        &self,
        actor: &Actor,
        post_id: PostId,
        collection_id: CollectionId,
    ) -> Result<bool, CollectionsServiceError> {
        let collection = self.managed_collection(actor, collection_id).await?;
        if Post::find_by_id(post_id).one(&self.db).await?.is_none() {
            return Err(CollectionsServiceError::PostNotFound);
        }

        let existing = PostCollection::find_by_id((post_id, collection.id))
            .one(&self.db)
            .await?;

        if existing.is_some() {
            PostCollection::delete_by_id((post_id, collection.id))
                .exec(&self.db)
                .await?;
            debug!(%post_id, %collection_id, "post unsaved");
            return Ok(false);
        }

        let link = PostCollectionActiveModel {
            post_id: Set(post_id),
            collection_id: Set(collection.id),
            added_at: Set(Utc::now()),
        };
        PostCollection::insert(link).exec(&self.db).await?;
        debug!(%post_id, %collection_id, "post saved");
        Ok(true)
    }

    /// Removing a post that is not in the collection is not an error.
    pub async fn _remove_post(
        &self,
        actor: &Actor,
        post_id: PostId,
        collection_id: CollectionId,
    ) -> Result<bool, CollectionsServiceError> {
        let collection = self.managed_collection(actor, collection_id).await?;

        let result = PostCollection::delete_by_id((post_id, collection.id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn managed_collection(
        &self,
        actor: &Actor,
        collection_id: CollectionId,
    ) -> Result<CollectionModel, CollectionsServiceError> {
        let collection = Collection::find_by_id(collection_id)
            .one(&self.db)
            .await?
            .ok_or(CollectionsServiceError::CollectionNotFound)?;

        if !actor.can_manage(collection.user_id) {
            return Err(CollectionsServiceError::Unauthorized);
        }
        Ok(collection)
    }

}

async fn name_taken<C: ConnectionTrait>(db: &C, owner: UserId, name: &str) -> Result<bool, DbErr> {
    let count = Collection::find()
        .filter(CollectionColumn::UserId.eq(owner))
        .filter(CollectionColumn::Name.eq(name))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// The (owner, name) index catches names claimed by a concurrent call.
fn duplicate_name(error: DbErr) -> CollectionsServiceError {
    if is_unique_violation(&error) {
        CollectionsServiceError::DuplicateName
    } else {
        CollectionsServiceError::DbError(error)
    }
}

fn validate_name(name: &str) -> Result<String, CollectionsServiceError> {
    let name = name.trim();
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_COLLECTION_NAME_CHARS {
        return Err(CollectionsServiceError::InvalidName);
    }
    Ok(name.to_string())
}

#[zel_service(name = "collections")]
trait Collections {
    #[method(name = "list")]
    async fn list(&self) -> Result<Vec<CollectionModel>, ResourceError>;

    #[method(name = "show")]
    async fn show(&self, collection_id: CollectionId) -> Result<CollectionDetails, ResourceError>;

    #[method(name = "create")]
    async fn create(
        &self,
        name: String,
        save_post: Option<PostId>,
    ) -> Result<CollectionModel, ResourceError>;

    #[method(name = "rename")]
    async fn rename(
        &self,
        collection_id: CollectionId,
        name: String,
    ) -> Result<CollectionModel, ResourceError>;

    #[method(name = "delete")]
    async fn delete(&self, collection_id: CollectionId) -> Result<(), ResourceError>;

    #[method(name = "is_name_available")]
    async fn is_name_available(&self, name: String) -> Result<bool, ResourceError>;

    #[method(name = "toggle_post")]
    async fn toggle_post(
        &self,
        post_id: PostId,
        collection_id: CollectionId,
    ) -> Result<bool, ResourceError>;

    #[method(name = "remove_post")]
    async fn remove_post(
        &self,
        post_id: PostId,
        collection_id: CollectionId,
    ) -> Result<bool, ResourceError>;
}

#[async_trait]
impl CollectionsServer for CollectionsService {
    async fn list(&self, ctx: RequestContext) -> Result<Vec<CollectionModel>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._list(&actor).await?)
    }

    async fn show(
        &self,
        ctx: RequestContext,
        collection_id: CollectionId,
    ) -> Result<CollectionDetails, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._show(&actor, collection_id).await?)
    }

    async fn create(
        &self,
        ctx: RequestContext,
        name: String,
        save_post: Option<PostId>,
    ) -> Result<CollectionModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._create(&actor, name, save_post).await?)
    }

    async fn rename(
        &self,
        ctx: RequestContext,
        collection_id: CollectionId,
        name: String,
    ) -> Result<CollectionModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._rename(&actor, collection_id, name).await?)
    }

    async fn delete(
        &self,
        ctx: RequestContext,
        collection_id: CollectionId,
    ) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._delete(&actor, collection_id).await?)
    }

    async fn is_name_available(
        &self,
        ctx: RequestContext,
        name: String,
    ) -> Result<bool, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._is_name_available(&actor, &name).await?)
    }

    async fn toggle_post(
        &self,
        ctx: RequestContext,
        post_id: PostId,
        collection_id: CollectionId,
    ) -> Result<bool, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._toggle_post(&actor, post_id, collection_id).await?)
    }

    async fn remove_post(
        &self,
        ctx: RequestContext,
        post_id: PostId,
        collection_id: CollectionId,
    ) -> Result<bool, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._remove_post(&actor, post_id, collection_id).await?)
    }
}
