use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use snapvault_common::StorageConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Connection string, or `memory` for the in-process metadata store.
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: String,
    /// Expected `aud` claim. Audience is not checked when unset.
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Largest accepted image body. Default: 10 MiB.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Permit fetching loopback, private and link-local addresses. Default: false.
    #[serde(default)]
    pub allow_private_networks: bool,
    /// Map each failure kind to its own HTTP status instead of a uniform 500.
    /// Default: false.
    #[serde(default)]
    pub distinct_error_status: bool,
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            user_agent: default_user_agent(),
            allow_private_networks: false,
            distinct_error_status: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "memory")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., SNAPVAULT__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("SNAPVAULT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
