use sea_orm_migration::{prelude::*, schema::*};

use super::m20260110_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Collection::Table)
                    .col(pk_uuid(Collection::Id))
                    .col(uuid(Collection::UserId))
                    .col(string(Collection::Name))
                    .col(boolean(Collection::IsDefault).default(false))
                    .col(timestamp_with_time_zone(Collection::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collection-user_id")
                            .from(Collection::Table, Collection::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One name per owner
        manager
            .create_index(
                Index::create()
                    .name("idx_collection_user_name_unique")
                    .table(Collection::Table)
                    .col(Collection::UserId)
                    .col(Collection::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Collection::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Collection {
    Table,
    Id,
    UserId,
    Name,
    IsDefault,
    CreatedAt,
}
