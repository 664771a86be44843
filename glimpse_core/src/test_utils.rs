//! Fixtures shared by the service tests.

use iroh::SecretKey;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use sea_orm_migration::MigratorTrait;

use crate::{
    entity::prelude::{Role, User, UserActiveModel},
    ids::UserId,
    models::migrator::Migrator,
    service::{session::Actor, users::UsersService},
};

/// Fresh in-memory database with every migration applied.
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Registers a public account the same way a new node would.
pub async fn register_user(db: &DatabaseConnection, username: &str) -> Actor {
    let node_id = SecretKey::generate(&mut rand::rng()).public();
    let user = UsersService::new(db.clone())
        ._register(
            node_id,
            username.to_string(),
            format!("{username}@example.com"),
        )
        .await
        .expect("Failed to register user");

    Actor::from(&user)
}

pub async fn register_admin(db: &DatabaseConnection, username: &str) -> Actor {
    let actor = register_user(db, username).await;
    set_role(db, actor.id, Role::Administrator).await;
    Actor {
        role: Role::Administrator,
        ..actor
    }
}

pub async fn set_public(db: &DatabaseConnection, user_id: UserId, is_public: bool) {
    let user = User::find_by_id(user_id).one(db).await.unwrap().unwrap();
    let mut user: UserActiveModel = user.into();
    user.is_public = Set(is_public);
    user.update(db).await.unwrap();
}

async fn set_role(db: &DatabaseConnection, user_id: UserId, role: Role) {
    let user = User::find_by_id(user_id).one(db).await.unwrap().unwrap();
    let mut user: UserActiveModel = user.into();
    user.role = Set(role);
    user.update(db).await.unwrap();
}
