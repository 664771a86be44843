//! Hand-ordered deletes for rows whose dependants are guarded by
//! `ON DELETE RESTRICT`. Every function runs on whatever connection it is
//! given, so callers pass their open transaction.

use sea_orm::sea_query::Expr;
use tracing::{debug, info};

use crate::{
    entity::prelude::*,
    ids::{CollectionId, GroupId, PostId, UserId},
};

/// Removes a post with its collection links, likes and comments.
pub async fn delete_post_tree<C: ConnectionTrait>(db: &C, post_id: PostId) -> Result<(), DbErr> {
    PostCollection::delete_many()
        .filter(PostCollectionColumn::PostId.eq(post_id))
        .exec(db)
        .await?;
    Like::delete_many()
        .filter(LikeColumn::PostId.eq(post_id))
        .exec(db)
        .await?;
    Comment::delete_many()
        .filter(CommentColumn::PostId.eq(post_id))
        .exec(db)
        .await?;
    Post::delete_by_id(post_id).exec(db).await?;

    debug!(%post_id, "post deleted");
    Ok(())
}

pub async fn delete_collection_tree<C: ConnectionTrait>(
    db: &C,
    collection_id: CollectionId,
) -> Result<(), DbErr> {
    PostCollection::delete_many()
        .filter(PostCollectionColumn::CollectionId.eq(collection_id))
        .exec(db)
        .await?;
    Collection::delete_by_id(collection_id).exec(db).await?;

    debug!(%collection_id, "collection deleted");
    Ok(())
}

/// Removes a group with its messages and memberships.
pub async fn delete_group_tree<C: ConnectionTrait>(db: &C, group_id: GroupId) -> Result<(), DbErr> {
    Message::delete_many()
        .filter(MessageColumn::GroupId.eq(group_id))
        .exec(db)
        .await?;
    GroupMember::delete_many()
        .filter(GroupMemberColumn::GroupId.eq(group_id))
        .exec(db)
        .await?;
    Group::delete_by_id(group_id).exec(db).await?;

    debug!(%group_id, "group deleted");
    Ok(())
}

/// Removes an account and everything that cannot outlive it. Messages the
/// user wrote in groups they did not moderate stay, with no author.
pub async fn delete_user_tree<C: ConnectionTrait>(db: &C, user_id: UserId) -> Result<(), DbErr> {
    Comment::delete_many()
        .filter(CommentColumn::UserId.eq(user_id))
        .exec(db)
        .await?;

    let posts = Post::find()
        .filter(PostColumn::AuthorId.eq(user_id))
        .all(db)
        .await?;
    for post in &posts {
        delete_post_tree(db, post.id).await?;
    }

    let collections = Collection::find()
        .filter(CollectionColumn::UserId.eq(user_id))
        .all(db)
        .await?;
    for collection in &collections {
        delete_collection_tree(db, collection.id).await?;
    }

    Like::delete_many()
        .filter(LikeColumn::UserId.eq(user_id))
        .exec(db)
        .await?;

    FollowRequest::delete_many()
        .filter(
            Condition::any()
                .add(FollowRequestColumn::FollowerId.eq(user_id))
                .add(FollowRequestColumn::FollowingId.eq(user_id)),
        )
        .exec(db)
        .await?;

    let groups = Group::find()
        .filter(GroupColumn::ModeratorId.eq(user_id))
        .all(db)
        .await?;
    for group in &groups {
        delete_group_tree(db, group.id).await?;
    }

    GroupMember::delete_many()
        .filter(GroupMemberColumn::UserId.eq(user_id))
        .exec(db)
        .await?;

    Message::update_many()
        .col_expr(MessageColumn::UserId, Expr::value(Option::<UserId>::None))
        .filter(MessageColumn::UserId.eq(user_id))
        .exec(db)
        .await?;

    Identity::delete_many()
        .filter(IdentityColumn::UserId.eq(user_id))
        .exec(db)
        .await?;

    User::delete_by_id(user_id).exec(db).await?;

    info!(
        %user_id,
        posts = posts.len(),
        collections = collections.len(),
        groups = groups.len(),
        "user deleted"
    );
    Ok(())
}
