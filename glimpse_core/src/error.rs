use sea_orm::DbErr;
use thiserror::Error;

/// Failures while bringing the core runtime up or down.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no data directory on this platform")]
    NoDataDir,

    #[error("config i/o failed")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid json")]
    Json(#[from] serde_json::Error),

    #[error("database bootstrap failed")]
    Db(#[from] DbErr),

    #[error("failed to build moderation client")]
    Moderation(#[from] reqwest::Error),

    #[error("rpc transport error: {0}")]
    Transport(String),
}
