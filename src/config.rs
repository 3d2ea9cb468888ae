use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::access::AccessSettings;
use crate::scheduler::WorkerSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    /// Public origin used to build share and view links.
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// S3-compatible bucket holding the uploaded blobs.
#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilesConfig {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_upload_bytes: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub view_window_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub signed_url_ttl_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sweep_interval_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sweep_grace_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sweep_batch_size: i64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            view_window_seconds: 300,
            signed_url_ttl_seconds: 300,
            sweep_interval_seconds: 600,
            sweep_grace_seconds: 3600,
            sweep_batch_size: 100,
        }
    }
}

impl FilesConfig {
    pub fn access_settings(&self) -> AccessSettings {
        AccessSettings {
            view_window: time::Duration::seconds(self.view_window_seconds as i64),
            signed_url_ttl: std::time::Duration::from_secs(self.signed_url_ttl_seconds),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkerConfig {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub workers: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_interval_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub lease_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub lease_renewal_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub retry_backoff_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval_ms: 1000,
            lease_seconds: 300,
            lease_renewal_seconds: 60,
            max_attempts: 1,
            retry_backoff_seconds: 30,
        }
    }
}

impl WorkerConfig {
    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: std::time::Duration::from_millis(self.poll_interval_ms),
            lease: time::Duration::seconds(self.lease_seconds as i64),
            lease_renewal: std::time::Duration::from_secs(self.lease_renewal_seconds.max(1)),
            max_attempts: self.max_attempts.max(1),
            retry_backoff: time::Duration::seconds(self.retry_backoff_seconds as i64),
        }
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. \
                Use either `local` or `production`.",
                other
            )),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv().ok();

        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .map_err(config::ConfigError::Message)?;
        let environment_file = format!("{}.yaml", environment.as_str());

        let base_path = std::env::current_dir().map_err(|e| {
            config::ConfigError::Message(format!("Failed to detect current directory: {e}"))
        })?;
        let configuration_directory = base_path.join("configuration");
        let config: config::Config = config::Config::builder()
            .add_source(config::File::from(
                configuration_directory.join("base.yaml"),
            ))
            .add_source(config::File::from(
                configuration_directory.join(environment_file),
            ))
            // APP_DATABASE__DATABASE_NAME -> database.database_name
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }
}
