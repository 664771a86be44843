use std::path::{Path, PathBuf};

use iroh::SecretKey;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

use crate::error::CoreError;

static DATA_DIR_NAME: &str = "glimpse";
static GLIMPSE_DB_NAME: &str = "glimpse_db.sqlite";
static CONFIG_FILE_NAME: &str = "config.json";

pub static MODERATION_API_KEY_ENV: &str = "GLIMPSE_MODERATION_API_KEY";

// data_dir_path
// |- glimpse
//    |- glimpse_db.sqlite
//    |- config.json

fn default_secret_key() -> SecretKey {
    SecretKey::generate(&mut rand::rng())
}

fn default_feed_page_size() -> u64 {
    4
}

fn default_base_url() -> String {
    "https://api.openai.com/v1/".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Settings for the external moderation service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModerationConfig {
    /// Moderation is disabled when no key is present.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

impl ModerationConfig {
    /// A non-empty key from the environment wins over the file.
    pub fn apply_env_override(&mut self, env_key: Option<String>) {
        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GlimpseConfig {
    /// Secret key for the local node/instance.
    #[serde(default = "default_secret_key")]
    pub(crate) secret_key: SecretKey,

    /// Secret key of the local client endpoint.
    #[serde(default = "default_secret_key")]
    pub(crate) client_secret_key: SecretKey,

    pub(crate) database_path: PathBuf,

    /// Account promoted to Administrator on every start.
    #[serde(default)]
    pub initial_admin_email: Option<String>,

    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: u64,

    #[serde(default)]
    pub moderation: ModerationConfig,
}

impl GlimpseConfig {
    /// Creates a config with fresh secret keys rooted at `data_dir`.
    fn new(data_dir: &Path) -> Self {
        GlimpseConfig {
            secret_key: default_secret_key(),
            client_secret_key: default_secret_key(),
            database_path: data_dir.join(GLIMPSE_DB_NAME),
            initial_admin_email: None,
            feed_page_size: default_feed_page_size(),
            moderation: ModerationConfig::default(),
        }
    }

    pub fn client_secret_key(&self) -> &SecretKey {
        &self.client_secret_key
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }
}

/// Gets the existing config or initializes a new one if it doesn't exist
pub async fn get_or_init() -> Result<GlimpseConfig, CoreError> {
    let data_dir = dirs::data_dir().ok_or(CoreError::NoDataDir)?;
    let mut config = load_or_create(&data_dir.join(DATA_DIR_NAME)).await?;
    config
        .moderation
        .apply_env_override(std::env::var(MODERATION_API_KEY_ENV).ok());
    Ok(config)
}

async fn load_or_create(glimpse_dir: &Path) -> Result<GlimpseConfig, CoreError> {
    let config_path = glimpse_dir.join(CONFIG_FILE_NAME);

    fs::create_dir_all(glimpse_dir).await?;

    if fs::try_exists(&config_path).await? {
        let mut file = fs::File::open(&config_path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let config: GlimpseConfig = serde_json::from_str(&contents)?;
        Ok(config)
    } else {
        let config = GlimpseConfig::new(glimpse_dir);

        let json = serde_json::to_string_pretty(&config)?;
        let mut file = fs::File::create(&config_path).await?;
        file.write_all(json.as_bytes()).await?;

        info!(path = %config_path.display(), "wrote new config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: GlimpseConfig =
            serde_json::from_str(r#"{ "database_path": "/tmp/glimpse.sqlite" }"#).unwrap();

        assert_eq!(config.feed_page_size, 4);
        assert_eq!(config.initial_admin_email, None);
        assert_eq!(config.moderation, ModerationConfig::default());
        assert_eq!(config.moderation.model, "gpt-4o-mini");
    }

    #[test]
    fn env_key_overrides_file_key() {
        let mut moderation = ModerationConfig {
            api_key: Some("from-file".to_string()),
            ..ModerationConfig::default()
        };

        moderation.apply_env_override(Some("  ".to_string()));
        assert_eq!(moderation.api_key.as_deref(), Some("from-file"));

        moderation.apply_env_override(None);
        assert_eq!(moderation.api_key.as_deref(), Some("from-file"));

        moderation.apply_env_override(Some("from-env".to_string()));
        assert_eq!(moderation.api_key.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn test_config_is_created_then_reloaded() {
        let dir = std::env::temp_dir().join(format!("glimpse-config-{}", uuid::Uuid::now_v7()));

        let created = load_or_create(&dir).await.unwrap();
        let reloaded = load_or_create(&dir).await.unwrap();

        assert_eq!(created.database_path, dir.join(GLIMPSE_DB_NAME));
        assert_eq!(created.database_path, reloaded.database_path);
        assert_eq!(created.secret_key.public(), reloaded.secret_key.public());

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
