use tokio::sync::OnceCell;

use std::{fmt::Display, sync::Arc, time::Duration};

use iroh::{endpoint::Connection, Endpoint};
use tracing::info;
use zel_core::{prelude::RpcServerBuilder, protocol::RpcClient, IrohBundle};

use crate::{
    error::CoreError,
    service::{
        collections::{CollectionsClient, CollectionsServer, CollectionsService},
        comments::{CommentsClient, CommentsServer, CommentsService},
        follows::{FollowsClient, FollowsServer, FollowsService},
        groups::{GroupsClient, GroupsServer, GroupsService},
        messages::{MessagesClient, MessagesServer, MessagesService},
        posts::{PostsClient, PostsServer, PostsService},
        users::{UsersClient, UsersServer, UsersService},
    },
};

pub mod config;
pub mod entity;
pub mod error;
pub mod ids;
pub mod models;
pub mod moderation;
pub mod service;

#[cfg(test)]
pub(crate) mod test_utils;

static GLIMPSE_CORE: OnceCell<Arc<GlimpseCore>> = OnceCell::const_new();
static ALPN: &[u8] = b"glimpse::0.1.0";

/// The process-wide runtime, started on first use.
pub async fn core() -> Result<Arc<GlimpseCore>, CoreError> {
    GLIMPSE_CORE
        .get_or_try_init(|| async move { Ok(Arc::new(GlimpseCore::start().await?)) })
        .await
        .cloned()
}

fn transport(error: impl Display) -> CoreError {
    CoreError::Transport(error.to_string())
}

/// Main runtime handle for Glimpse.
pub struct GlimpseCore {
    pub config: config::GlimpseConfig,

    /// Server bundle that accepts inbound RPC traffic.
    pub server: IrohBundle,

    /// Client-side endpoint used to talk to the local server.
    pub client_endpoint: Endpoint,

    /// Typed clients for the local server.
    pub users: UsersClient,
    pub posts: PostsClient,
    pub comments: CommentsClient,
    pub collections: CollectionsClient,
    pub follows: FollowsClient,
    pub groups: GroupsClient,
    pub messages: MessagesClient,
}

impl GlimpseCore {
    pub async fn start() -> Result<Self, CoreError> {
        let config = config::get_or_init().await?;

        // DB + migrations
        let db = models::open_or_create_db(&config).await?;
        models::migrate_up(&db).await?;

        let moderator = moderation::from_config(&config.moderation)?;

        let users_service = UsersService::new(db.clone());
        if let Some(email) = config.initial_admin_email.as_deref() {
            let promoted = users_service
                ._ensure_admin_email(email)
                .await
                .map_err(transport)?;
            if promoted {
                info!(%email, "initial administrator promoted");
            }
        }

        // ----------------
        // Server endpoint
        // ----------------
        let mut server_builder = IrohBundle::builder(Some(config.secret_key.clone()))
            .await
            .map_err(transport)?;
        let server_endpoint = server_builder.endpoint().clone();

        let rpc_server_builder = RpcServerBuilder::new(ALPN, server_endpoint.clone());
        let rpc_server_builder = users_service.register_service(rpc_server_builder);
        let rpc_server_builder = PostsService::new(db.clone(), moderator.clone(), config.feed_page_size)
            .register_service(rpc_server_builder);
        let rpc_server_builder = CommentsService::new(db.clone(), moderator.clone())
            .register_service(rpc_server_builder);
        let rpc_server_builder =
            CollectionsService::new(db.clone()).register_service(rpc_server_builder);
        let rpc_server_builder = FollowsService::new(db.clone()).register_service(rpc_server_builder);
        let rpc_server_builder = GroupsService::new(db.clone()).register_service(rpc_server_builder);
        let rpc_server_builder =
            MessagesService::new(db.clone(), moderator).register_service(rpc_server_builder);

        let rpc_server = rpc_server_builder.build();

        let server = server_builder.accept(ALPN, rpc_server).finish().await;

        server.wait_online().await;
        info!(node_id = %server.endpoint.id(), "glimpse node online");

        // ----------------
        // Client endpoint
        // ----------------
        let client_endpoint = Endpoint::builder()
            .secret_key(config.client_secret_key().clone())
            .alpns(vec![ALPN.to_vec()])
            .bind()
            .await
            .map_err(transport)?;

        client_endpoint.online().await;

        // Connect client endpoint -> server endpoint
        let conn = client_endpoint
            .connect(server.endpoint.addr(), ALPN)
            .await
            .map_err(transport)?;

        Ok(Self {
            users: UsersClient::new(rpc_client(&conn).await?),
            posts: PostsClient::new(rpc_client(&conn).await?),
            comments: CommentsClient::new(rpc_client(&conn).await?),
            collections: CollectionsClient::new(rpc_client(&conn).await?),
            follows: FollowsClient::new(rpc_client(&conn).await?),
            groups: GroupsClient::new(rpc_client(&conn).await?),
            messages: MessagesClient::new(rpc_client(&conn).await?),
            config,
            server,
            client_endpoint,
        })
    }

    pub async fn shutdown(self) -> Result<(), CoreError> {
        // Close client endpoint
        self.client_endpoint.close().await;

        // Shutdown server bundle
        self.server
            .shutdown(Duration::from_secs(5))
            .await
            .map_err(transport)?;
        info!("glimpse node stopped");
        Ok(())
    }
}

async fn rpc_client(conn: &Connection) -> Result<RpcClient, CoreError> {
    RpcClient::new(conn.clone()).await.map_err(transport)
}

pub mod prelude {
    pub use super::config;
    pub use super::entity;
    pub use super::error;
    pub use super::ids;
    pub use super::models;
    pub use super::moderation;
    pub use super::service;
    pub use super::{core, GlimpseCore};

    pub use zel_core;
}
