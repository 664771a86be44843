use sea_orm_migration::{prelude::*, schema::*};

use super::m20260110_000003_create_post_table::Post;
use super::m20260110_000006_create_collection_table::Collection;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostCollection::Table)
                    .col(uuid(PostCollection::PostId))
                    .col(uuid(PostCollection::CollectionId))
                    .col(timestamp_with_time_zone(PostCollection::AddedAt))
                    .primary_key(
                        Index::create()
                            .col(PostCollection::PostId)
                            .col(PostCollection::CollectionId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-post_collection-post_id")
                            .from(PostCollection::Table, PostCollection::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-post_collection-collection_id")
                            .from(PostCollection::Table, PostCollection::CollectionId)
                            .to(Collection::Table, Collection::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_collection_collection_id")
                    .table(PostCollection::Table)
                    .col(PostCollection::CollectionId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostCollection::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PostCollection {
    Table,
    PostId,
    CollectionId,
    AddedAt,
}
