use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{DatabaseConnection, QueryTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use zel_core::prelude::*;

use crate::{
    entity::prelude::*,
    ids::{CollectionId, PostId, UserId},
    models::{
        cascade, is_unique_violation,
        page::{fetch_page, Page},
    },
    moderation::{ModerationOutcome, SentimentOutcome, SharedModerator},
    service::{
        comments::CommentWithAuthor,
        content::{ContentBody, ContentError, MediaEdit},
        follows::followed_ids,
        session::{Actor, Sessions},
    },
};

#[derive(Debug, Error)]
pub enum PostsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("post not found")]
    PostNotFound,

    #[error("unauthorized: not post author")]
    Unauthorized,

    #[error(transparent)]
    InvalidContent(#[from] ContentError),

    #[error("post was rejected by moderation: {0}")]
    Flagged(String),
}

impl From<PostsServiceError> for ResourceError {
    fn from(error: PostsServiceError) -> Self {
        match error {
            PostsServiceError::DbError(error) => ResourceError::infra(error),
            PostsServiceError::PostNotFound => ResourceError::app(error),
            PostsServiceError::Unauthorized => ResourceError::app(error),
            PostsServiceError::InvalidContent(_) => ResourceError::app(error),
            PostsServiceError::Flagged(_) => ResourceError::app(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    pub post: PostModel,
    pub author: UserModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetails {
    pub post: PostModel,
    pub author: UserModel,
    pub like_count: u64,
    /// Newest first
    pub comments: Vec<CommentWithAuthor>,
    /// The viewer's collections holding this post.
    pub saved_in: Vec<CollectionId>,
}

/// Replacement body for a post. `text` is the full new text, `None` or
/// blank drops it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostEdit {
    pub text: Option<String>,
    pub image: MediaEdit,
    pub video: MediaEdit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub count: u64,
}

#[derive(Clone)]
pub struct PostsService {
    db: DatabaseConnection,
    sessions: Sessions,
    moderator: SharedModerator,
    page_size: u64,
}

impl PostsService {
    pub fn new(db: DatabaseConnection, moderator: SharedModerator, page_size: u64) -> Self {
        let sessions = Sessions::new(db.clone());
        Self {
            db,
            sessions,
            moderator,
            page_size,
        }
    }

    pub async fn _create_post(
        &self,
        actor: &Actor,
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<PostModel, PostsServiceError> {
        let body = ContentBody::new(text, image_url, video_url)?;

        if let Some(text) = &body.text {
            self.moderate(text).await?;
        }
        let (sentiment_label, sentiment_confidence, sentiment_analyzed_at) =
            self.score(body.text.as_deref()).await;

        let post = PostActiveModel {
            id: Set(PostId::new()),
            author_id: Set(actor.id),
            text_content: Set(body.text),
            image_url: Set(body.image_url),
            video_url: Set(body.video_url),
            created_at: Set(Utc::now()),
            sentiment_label: Set(sentiment_label),
            sentiment_confidence: Set(sentiment_confidence),
            sentiment_analyzed_at: Set(sentiment_analyzed_at),
        };

        let post = Post::insert(post).exec_with_returning(&self.db).await?;
        debug!(post_id = %post.id, author = %actor.id, "post created");
        Ok(post)
    }

    pub async fn _get_post(&self, post_id: PostId) -> Result<PostModel, PostsServiceError> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(PostsServiceError::PostNotFound)
    }

    pub async fn _post_details(
        &self,
        viewer: Option<&Actor>,
        post_id: PostId,
    ) -> Result<PostDetails, PostsServiceError> {
        let (post, author) = Post::find_by_id(post_id)
            .find_also_related(User)
            .one(&self.db)
            .await?
            .ok_or(PostsServiceError::PostNotFound)?;
        let author = author.ok_or(PostsServiceError::PostNotFound)?;

        let like_count = Like::find()
            .filter(LikeColumn::PostId.eq(post_id))
            .count(&self.db)
            .await?;

        let comments = Comment::find()
            .filter(CommentColumn::PostId.eq(post_id))
            .order_by_desc(CommentColumn::CreatedAt)
            .find_also_related(User)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(comment, author)| {
                author.map(|author| CommentWithAuthor { comment, author })
            })
            .collect();

        let saved_in = match viewer {
            Some(viewer) => {
                let own_collections = Collection::find()
                    .select_only()
                    .column(CollectionColumn::Id)
                    .filter(CollectionColumn::UserId.eq(viewer.id))
                    .into_query();

                PostCollection::find()
                    .filter(PostCollectionColumn::PostId.eq(post_id))
                    .filter(PostCollectionColumn::CollectionId.in_subquery(own_collections))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|link| link.collection_id)
                    .collect()
            }
            None => Vec::new(),
        };

        Ok(PostDetails {
            post,
            author,
            like_count,
            comments,
            saved_in,
        })
    }

    /// Nothing is written unless the edited post is valid and passes
    /// moderation.
    pub async fn _edit_post(
        &self,
        actor: &Actor,
        post_id: PostId,
        edit: PostEdit,
    ) -> Result<PostModel, PostsServiceError> {
        let post = self._get_post(post_id).await?;
        if !actor.can_manage(post.author_id) {
            return Err(PostsServiceError::Unauthorized);
        }

        let image_url = edit.image.apply(post.image_url.clone());
        let video_url = edit.video.apply(post.video_url.clone());
        let body = ContentBody::new(edit.text, image_url, video_url)?;

        if let Some(text) = &body.text {
            self.moderate(text).await?;
        }
        let (sentiment_label, sentiment_confidence, sentiment_analyzed_at) =
            self.score(body.text.as_deref()).await;

        let mut post: PostActiveModel = post.into();
        post.text_content = Set(body.text);
        post.image_url = Set(body.image_url);
        post.video_url = Set(body.video_url);
        post.sentiment_label = Set(sentiment_label);
        post.sentiment_confidence = Set(sentiment_confidence);
        post.sentiment_analyzed_at = Set(sentiment_analyzed_at);

        Ok(post.update(&self.db).await?)
    }

    pub async fn _delete_post(&self, actor: &Actor, post_id: PostId) -> Result<(), PostsServiceError> {
        let post = self._get_post(post_id).await?;
        if !actor.can_manage(post.author_id) {
            return Err(PostsServiceError::Unauthorized);
        }

        let txn = self.db.begin().await?;
        cascade::delete_post_tree(&txn, post.id).await?;
        txn.commit().await?;

        info!(%post_id, by = %actor.id, "post deleted");
        Ok(())
    }

    /// Posts by public authors, followed authors and the viewer, newest first.
    pub async fn _feed(
        &self,
        viewer: Option<&Actor>,
        page: u64,
    ) -> Result<Page<PostWithAuthor>, PostsServiceError> {
        let public_authors = User::find()
            .select_only()
            .column(UserColumn::Id)
            .filter(UserColumn::IsPublic.eq(true))
            .into_query();

        let mut visible = Condition::any().add(PostColumn::AuthorId.in_subquery(public_authors));
        if let Some(viewer) = viewer {
            let followed = followed_ids(&self.db, viewer.id).await?;
            visible = visible
                .add(PostColumn::AuthorId.eq(viewer.id))
                .add(PostColumn::AuthorId.is_in(followed));
        }

        let select = Post::find()
            .filter(visible)
            .order_by_desc(PostColumn::CreatedAt)
            .order_by_desc(PostColumn::Id);

        let page = fetch_page(&self.db, select, page, self.page_size).await?;
        self.attach_authors_to_page(page).await
    }

    /// Only authors the actor follows with an accepted request.
    pub async fn _following_feed(
        &self,
        actor: &Actor,
        page: u64,
    ) -> Result<Page<PostWithAuthor>, PostsServiceError> {
        let followed = followed_ids(&self.db, actor.id).await?;

        let select = Post::find()
            .filter(PostColumn::AuthorId.is_in(followed))
            .order_by_desc(PostColumn::CreatedAt)
            .order_by_desc(PostColumn::Id);

        let page = fetch_page(&self.db, select, page, self.page_size).await?;
        self.attach_authors_to_page(page).await
    }

    pub async fn _toggle_like(
        &self,
        actor: &Actor,
        post_id: PostId,
    ) -> Result<LikeState, PostsServiceError> {
        let post = self._get_post(post_id).await?;

        let txn = self.db.begin().await?;
        let existing = Like::find_by_id((actor.id, post.id)).one(&txn).await?;
        let liked = match existing {
            Some(_) => {
                Like::delete_by_id((actor.id, post.id)).exec(&txn).await?;
                false
            }
            None => {
                let like = LikeActiveModel {
                    user_id: Set(actor.id),
                    post_id: Set(post.id),
                    created_at: Set(Utc::now()),
                };
                match Like::insert(like).exec(&txn).await {
                    Ok(_) => true,
                    // A concurrent toggle got there first
                    Err(error) if is_unique_violation(&error) => true,
                    Err(error) => return Err(error.into()),
                }
            }
        };
        txn.commit().await?;

        let count = Like::find()
            .filter(LikeColumn::PostId.eq(post.id))
            .count(&self.db)
            .await?;

        Ok(LikeState { liked, count })
    }

    /// Most recently liked first.
    pub async fn _liked_posts(&self, actor: &Actor) -> Result<Vec<PostWithAuthor>, PostsServiceError> {
        let posts = Like::find()
            .filter(LikeColumn::UserId.eq(actor.id))
            .order_by_desc(LikeColumn::CreatedAt)
            .find_also_related(Post)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(_, post)| post)
            .collect();

        self.attach_authors(posts).await
    }

    /// Every post by one author, for the administrator content view.
    pub async fn _posts_by(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<Vec<PostModel>, PostsServiceError> {
        if !actor.is_admin() {
            return Err(PostsServiceError::Unauthorized);
        }

        let posts = Post::find()
            .filter(PostColumn::AuthorId.eq(user_id))
            .order_by_desc(PostColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(posts)
    }

    async fn moderate(&self, text: &str) -> Result<(), PostsServiceError> {
        match self.moderator.check_content(text).await {
            ModerationOutcome::Flagged { category } => Err(PostsServiceError::Flagged(category)),
            // An outage lets the post through
            ModerationOutcome::Clean | ModerationOutcome::Unavailable { .. } => Ok(()),
        }
    }

    async fn score(
        &self,
        text: Option<&str>,
    ) -> (
        Option<SentimentLabel>,
        Option<f64>,
        Option<chrono::DateTime<Utc>>,
    ) {
        let Some(text) = text else {
            return (None, None, None);
        };

        match self.moderator.analyze_sentiment(text).await {
            SentimentOutcome::Scored { label, confidence } => {
                (Some(label), Some(confidence), Some(Utc::now()))
            }
            SentimentOutcome::Unavailable => (None, None, None),
        }
    }

    async fn attach_authors(
        &self,
        posts: Vec<PostModel>,
    ) -> Result<Vec<PostWithAuthor>, PostsServiceError> {
        let author_ids: Vec<UserId> = posts.iter().map(|post| post.author_id).collect();
        let authors: HashMap<UserId, UserModel> = User::find()
            .filter(UserColumn::Id.is_in(author_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let author = authors.get(&post.author_id)?.clone();
                Some(PostWithAuthor { post, author })
            })
            .collect())
    }

    async fn attach_authors_to_page(
        &self,
        page: Page<PostModel>,
    ) -> Result<Page<PostWithAuthor>, PostsServiceError> {
        let Page {
            items,
            total_items,
            this_page,
            page_count,
        } = page;

        Ok(Page {
            items: self.attach_authors(items).await?,
            total_items,
            this_page,
            page_count,
        })
    }
}

#[zel_service(name = "posts")]
trait Posts {
    #[doc = "Publish a post with any mix of text, image and video"]
    #[method(name = "create_post")]
    async fn create_post(
        &self,
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<PostModel, ResourceError>;

    #[doc = "A post with its author, likes, comments and the caller's saves"]
    #[method(name = "post_details")]
    async fn post_details(&self, post_id: PostId) -> Result<PostDetails, ResourceError>;

    #[method(name = "edit_post")]
    async fn edit_post(&self, post_id: PostId, edit: PostEdit) -> Result<PostModel, ResourceError>;

    #[method(name = "delete_post")]
    async fn delete_post(&self, post_id: PostId) -> Result<(), ResourceError>;

    #[doc = "Home feed, pages start at 1"]
    #[method(name = "feed")]
    async fn feed(&self, page: u64) -> Result<Page<PostWithAuthor>, ResourceError>;

    #[method(name = "following_feed")]
    async fn following_feed(&self, page: u64) -> Result<Page<PostWithAuthor>, ResourceError>;

    #[method(name = "toggle_like")]
    async fn toggle_like(&self, post_id: PostId) -> Result<LikeState, ResourceError>;

    #[method(name = "liked_posts")]
    async fn liked_posts(&self) -> Result<Vec<PostWithAuthor>, ResourceError>;

    #[method(name = "posts_by")]
    async fn posts_by(&self, user_id: UserId) -> Result<Vec<PostModel>, ResourceError>;
}

#[async_trait]
impl PostsServer for PostsService {
    async fn create_post(
        &self,
        ctx: RequestContext,
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<PostModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._create_post(&actor, text, image_url, video_url).await?)
    }

    async fn post_details(
        &self,
        ctx: RequestContext,
        post_id: PostId,
    ) -> Result<PostDetails, ResourceError> {
        let viewer = self.sessions.viewer(&ctx).await?;
        Ok(self._post_details(viewer.as_ref(), post_id).await?)
    }

    async fn edit_post(
        &self,
        ctx: RequestContext,
        post_id: PostId,
        edit: PostEdit,
    ) -> Result<PostModel, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._edit_post(&actor, post_id, edit).await?)
    }

    async fn delete_post(&self, ctx: RequestContext, post_id: PostId) -> Result<(), ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._delete_post(&actor, post_id).await?)
    }

    async fn feed(
        &self,
        ctx: RequestContext,
        page: u64,
    ) -> Result<Page<PostWithAuthor>, ResourceError> {
        let viewer = self.sessions.viewer(&ctx).await?;
        Ok(self._feed(viewer.as_ref(), page).await?)
    }

    async fn following_feed(
        &self,
        ctx: RequestContext,
        page: u64,
    ) -> Result<Page<PostWithAuthor>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._following_feed(&actor, page).await?)
    }

    async fn toggle_like(
        &self,
        ctx: RequestContext,
        post_id: PostId,
    ) -> Result<LikeState, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._toggle_like(&actor, post_id).await?)
    }

    async fn liked_posts(&self, ctx: RequestContext) -> Result<Vec<PostWithAuthor>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._liked_posts(&actor).await?)
    }

    async fn posts_by(
        &self,
        ctx: RequestContext,
        user_id: UserId,
    ) -> Result<Vec<PostModel>, ResourceError> {
        let actor = self.sessions.require(&ctx).await?;
        Ok(self._posts_by(&actor, user_id).await?)
    }
}
