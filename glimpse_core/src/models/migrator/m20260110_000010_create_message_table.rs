use sea_orm_migration::{prelude::*, schema::*};

use super::m20260110_000001_create_user_table::User;
use super::m20260110_000008_create_group_table::Group;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Message::Table)
                    .col(pk_uuid(Message::Id))
                    .col(uuid(Message::GroupId))
                    .col(uuid_null(Message::UserId))
                    .col(string_null(Message::TextContent))
                    .col(string_null(Message::ImageUrl))
                    .col(string_null(Message::VideoUrl))
                    .col(timestamp_with_time_zone(Message::CreatedAt))
                    .col(timestamp_with_time_zone_null(Message::EditedAt))
                    .col(boolean_null(Message::IsSafe))
                    .col(boolean(Message::IsReported).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message-group_id")
                            .from(Message::Table, Message::GroupId)
                            .to(Group::Table, Group::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    // Messages outlive their author's account
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message-user_id")
                            .from(Message::Table, Message::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_message_group_id")
                    .table(Message::Table)
                    .col(Message::GroupId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Message::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Message {
    Table,
    Id,
    GroupId,
    UserId,
    TextContent,
    ImageUrl,
    VideoUrl,
    CreatedAt,
    EditedAt,
    IsSafe,
    IsReported,
}
