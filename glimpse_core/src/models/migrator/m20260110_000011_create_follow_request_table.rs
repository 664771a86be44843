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
                    .table(FollowRequest::Table)
                    .col(uuid(FollowRequest::FollowerId))
                    .col(uuid(FollowRequest::FollowingId))
                    .col(string(FollowRequest::Status))
                    .col(timestamp_with_time_zone(FollowRequest::CreatedAt))
                    .primary_key(
                        Index::create()
                            .col(FollowRequest::FollowerId)
                            .col(FollowRequest::FollowingId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-follow_request-follower_id")
                            .from(FollowRequest::Table, FollowRequest::FollowerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-follow_request-following_id")
                            .from(FollowRequest::Table, FollowRequest::FollowingId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Incoming requests and follower counts filter on the target
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_request_following_id")
                    .table(FollowRequest::Table)
                    .col(FollowRequest::FollowingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowRequest::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum FollowRequest {
    Table,
    FollowerId,
    FollowingId,
    Status,
    CreatedAt,
}
