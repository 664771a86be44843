use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .col(pk_uuid(User::Id))
                    .col(string_uniq(User::Username))
                    .col(string_uniq(User::Email))
                    .col(string_null(User::FullName))
                    .col(string_null(User::Description))
                    .col(string_null(User::AvatarUrl))
                    .col(boolean(User::IsPublic).default(true))
                    .col(string(User::Role))
                    .col(timestamp_with_time_zone(User::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Search matches on the display name
        manager
            .create_index(
                Index::create()
                    .name("idx_user_full_name")
                    .table(User::Table)
                    .col(User::FullName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Username,
    Email,
    FullName,
    Description,
    AvatarUrl,
    IsPublic,
    Role,
    CreatedAt,
}
