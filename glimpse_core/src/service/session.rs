use iroh::PublicKey;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zel_core::prelude::*;

use crate::{entity::prelude::*, ids::UserId};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    /// Owners and administrators may change a resource.
    pub fn can_manage(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

impl From<&UserModel> for Actor {
    fn from(user: &UserModel) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("this node is not registered")]
    NotRegistered,
}

impl From<SessionError> for ResourceError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::DbError(error) => ResourceError::infra(error),
            SessionError::NotRegistered => ResourceError::app(error),
        }
    }
}

/// Maps iroh node ids to accounts.
#[derive(Clone)]
pub struct Sessions {
    db: DatabaseConnection,
}

impl Sessions {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Role is read on every call so promotions apply immediately.
    pub async fn lookup(&self, node_id: &PublicKey) -> Result<Option<Actor>, DbErr> {
        let identity = Identity::find_by_id(node_id.as_bytes().to_vec())
            .one(&self.db)
            .await?;

        let Some(identity) = identity else {
            return Ok(None);
        };

        let user = User::find_by_id(identity.user_id).one(&self.db).await?;
        Ok(user.as_ref().map(Actor::from))
    }

    pub async fn viewer(&self, ctx: &RequestContext) -> Result<Option<Actor>, SessionError> {
        let node_id = ctx.connection().remote_id();
        Ok(self.lookup(&node_id).await?)
    }

    pub async fn require(&self, ctx: &RequestContext) -> Result<Actor, SessionError> {
        self.viewer(ctx).await?.ok_or(SessionError::NotRegistered)
    }
}
