use crate::ids::{CollectionId, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Name given to the collection every account starts with.
pub const DEFAULT_COLLECTION_NAME: &str = "All Posts";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collection")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: CollectionId,
    pub user_id: UserId,
    pub name: String,
    /// The default collection can be neither renamed nor deleted.
    pub is_default: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::post_collection::Entity")]
    PostCollection,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::post_collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostCollection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
