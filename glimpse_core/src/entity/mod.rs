// SeaORM entities, one module per table

pub mod collection;
pub mod comment;
pub mod follow_request;
pub mod group;
pub mod group_member;
pub mod identity;
pub mod like;
pub mod message;
pub mod post;
pub mod post_collection;
pub mod user;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use super::collection::{
        ActiveModel as CollectionActiveModel, Column as CollectionColumn, Entity as Collection,
        Model as CollectionModel, DEFAULT_COLLECTION_NAME,
    };
    pub use super::comment::{
        ActiveModel as CommentActiveModel, Column as CommentColumn, Entity as Comment,
        Model as CommentModel,
    };
    pub use super::follow_request::{
        ActiveModel as FollowRequestActiveModel, Column as FollowRequestColumn,
        Entity as FollowRequest, FollowStatus, Model as FollowRequestModel,
    };
    pub use super::group::{
        ActiveModel as GroupActiveModel, Column as GroupColumn, Entity as Group,
        Model as GroupModel,
    };
    pub use super::group_member::{
        ActiveModel as GroupMemberActiveModel, Column as GroupMemberColumn,
        Entity as GroupMember, MembershipStatus, Model as GroupMemberModel,
    };
    pub use super::identity::{
        ActiveModel as IdentityActiveModel, Column as IdentityColumn, Entity as Identity,
        Model as IdentityModel,
    };
    pub use super::like::{
        ActiveModel as LikeActiveModel, Column as LikeColumn, Entity as Like,
        Model as LikeModel,
    };
    pub use super::message::{
        ActiveModel as MessageActiveModel, Column as MessageColumn, Entity as Message,
        Model as MessageModel,
    };
    pub use super::post::{
        ActiveModel as PostActiveModel, Column as PostColumn, Entity as Post,
        Model as PostModel, SentimentLabel,
    };
    pub use super::post_collection::{
        ActiveModel as PostCollectionActiveModel, Column as PostCollectionColumn,
        Entity as PostCollection, Model as PostCollectionModel,
    };
    pub use super::user::{
        ActiveModel as UserActiveModel, Column as UserColumn, Entity as User,
        Model as UserModel, Role,
    };

    pub use sea_orm::{
        ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, Database,
        DatabaseConnection, DbErr, EntityTrait, ModelTrait, NotSet, PaginatorTrait,
        QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, Unchanged,
    };
}
