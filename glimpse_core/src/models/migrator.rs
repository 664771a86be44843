use sea_orm_migration::prelude::*;

mod m20260110_000001_create_user_table;
mod m20260110_000002_create_identity_table;
mod m20260110_000003_create_post_table;
mod m20260110_000004_create_comment_table;
mod m20260110_000005_create_like_table;
mod m20260110_000006_create_collection_table;
mod m20260110_000007_create_post_collection_table;
mod m20260110_000008_create_group_table;
mod m20260110_000009_create_group_member_table;
mod m20260110_000010_create_message_table;
mod m20260110_000011_create_follow_request_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260110_000001_create_user_table::Migration),
            Box::new(m20260110_000002_create_identity_table::Migration),
            Box::new(m20260110_000003_create_post_table::Migration),
            Box::new(m20260110_000004_create_comment_table::Migration),
            Box::new(m20260110_000005_create_like_table::Migration),
            Box::new(m20260110_000006_create_collection_table::Migration),
            Box::new(m20260110_000007_create_post_collection_table::Migration),
            Box::new(m20260110_000008_create_group_table::Migration),
            Box::new(m20260110_000009_create_group_member_table::Migration),
            Box::new(m20260110_000010_create_message_table::Migration),
            Box::new(m20260110_000011_create_follow_request_table::Migration),
        ]
    }
}

#[cfg(test)]
use sea_orm::{Database, DbErr};

#[tokio::test]
async fn test_migrations_okay() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::refresh(&db).await?;

    for table in [
        "user",
        "identity",
        "post",
        "comment",
        "like",
        "collection",
        "post_collection",
        "group",
        "group_member",
        "message",
        "follow_request",
    ] {
        assert!(schema_manager.has_table(table).await?, "missing table {table}");
    }

    Ok(())
}

#[tokio::test]
async fn test_migrations_roll_back_cleanly() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::up(&db, None).await?;
    Migrator::down(&db, None).await?;

    assert!(!schema_manager.has_table("user").await?);
    assert!(!schema_manager.has_table("follow_request").await?);

    Ok(())
}
