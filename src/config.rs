use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the course portal server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,
    /// Upper bound on open database connections.
    pub database_max_connections: u32,
    /// Connections kept open while idle.
    pub database_min_idle: u32,
    /// HTTP port the API listens on.
    pub server_port: u16,
    /// Object store settings.
    pub storage: StorageConfig,
    /// Base URL of the Meilisearch instance.
    pub meili_url: String,
    /// Optional Meilisearch API key.
    pub meili_api_key: Option<String>,
    /// Base URL of the Tika text-extraction server.
    pub tika_url: String,
    /// Upper bound on a single extraction request.
    pub tika_timeout: Duration,
}

/// Which object store backs document blobs.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    /// S3-compatible endpoint such as MinIO.
    S3(S3Config),
    /// Local directory, for development.
    Filesystem {
        /// Root directory for blobs.
        root: PathBuf,
    },
}

/// Connection settings for an S3-compatible object store.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Endpoint URL, e.g. `http://localhost:9000`.
    pub endpoint: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Bucket holding document blobs.
    pub bucket: String,
    /// Signing region.
    pub region: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: load_env("DATABASE_URL")?,
            database_max_connections: parse_env_or("DATABASE_MAX_CONNECTIONS", 100)?,
            database_min_idle: parse_env_or("DATABASE_MIN_IDLE", 10)?,
            server_port: parse_env_or("SERVER_PORT", 8000)?,
            storage: load_storage()?,
            meili_url: load_env_or("MEILI_URL", "http://localhost:7700"),
            meili_api_key: load_env_optional("MEILI_API_KEY"),
            tika_url: load_env_or("TIKA_URL", "http://localhost:9998"),
            tika_timeout: Duration::from_secs(parse_env_or("TIKA_TIMEOUT_SECS", 30)?),
        })
    }
}

fn load_storage() -> Result<StorageConfig, ConfigError> {
    let backend = load_env_or("STORAGE_BACKEND", "s3");
    match backend.to_lowercase().as_str() {
        "s3" | "minio" => Ok(StorageConfig::S3(S3Config {
            endpoint: load_env_or("S3_ENDPOINT", "http://localhost:9000"),
            access_key: load_env("S3_ACCESS_KEY")?,
            secret_key: load_env("S3_SECRET_KEY")?,
            bucket: load_env_or("S3_BUCKET", "documents"),
            region: load_env_or("S3_REGION", "us-east-1"),
        })),
        "filesystem" | "fs" => Ok(StorageConfig::Filesystem {
            root: PathBuf::from(load_env_or("STORAGE_PATH", "data/blobs")),
        }),
        _ => Err(ConfigError::InvalidValue("STORAGE_BACKEND".into())),
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        server_port = config.server_port,
        meili_url = %config.meili_url,
        tika_url = %config.tika_url,
        storage = ?storage_label(&config.storage),
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

fn storage_label(storage: &StorageConfig) -> &'static str {
    match storage {
        StorageConfig::S3(_) => "s3",
        StorageConfig::Filesystem { .. } => "filesystem",
    }
}
