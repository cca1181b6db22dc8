//! Process-wide configuration.
//!
//! Loaded once at startup from a TOML file with environment variable
//! substitution, read-only thereafter. Missing required settings are fatal:
//! the process refuses to start rather than run with undefined behavior.
//!
//! # Example
//!
//! ```toml
//! [store]
//! table_name = "images"
//!
//! [mailer]
//! from = "${MAILER_FROM}"
//! to = "${MAILER_TO}"
//! region = "eu-west-1"
//!
//! [queues]
//! metadata = "https://queue.example/log-image"
//! processor = "https://queue.example/process-image"
//! notifier = "https://queue.example/mailer"
//! ```

use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub mailer: MailerConfig,

    #[serde(default)]
    pub queues: QueuesConfig,

    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Record store configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Target table for image records. Required.
    #[serde(default)]
    pub table_name: String,
}

/// Mailer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MailerConfig {
    /// Sender address. Required.
    #[serde(default)]
    pub from: String,

    /// Recipient address. Required.
    #[serde(default)]
    pub to: String,

    /// Provider region. Required.
    #[serde(default)]
    pub region: String,

    /// Scheme for the object locator embedded in the body
    #[serde(default = "default_locator_scheme")]
    pub locator_scheme: String,

    /// Display name in the notification contact block
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            region: String::new(),
            locator_scheme: default_locator_scheme(),
            sender_name: default_sender_name(),
        }
    }
}

fn default_locator_scheme() -> String {
    "s3".to_string()
}

fn default_sender_name() -> String {
    "The Photo Album".to_string()
}

/// Queue URLs, one per consumer
#[derive(Debug, Deserialize, Clone, Default)]
pub struct QueuesConfig {
    #[serde(default)]
    pub metadata: String,

    #[serde(default)]
    pub processor: String,

    #[serde(default)]
    pub notifier: String,
}

/// Worker loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Messages pulled per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Long-poll wait for a batch to fill
    #[serde(default = "default_linger_seconds")]
    pub linger_seconds: u64,

    /// Wall-clock budget per invocation; an exceeded batch is abandoned
    /// whole and redelivered
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Visibility window for the in-process queue
    #[serde(default = "default_visibility_seconds")]
    pub visibility_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            linger_seconds: default_linger_seconds(),
            timeout_seconds: default_timeout_seconds(),
            visibility_seconds: default_visibility_seconds(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_linger_seconds() -> u64 {
    5
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_visibility_seconds() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from the default path or `DARKROOM_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var("DARKROOM_CONFIG").unwrap_or_else(|_| "config/darkroom.toml".to_string());

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        info!(path = %path.display(), "loading configuration");

        let content = fs::read_to_string(path)?;
        let content = substitute_env_vars(&content);

        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;

        info!(
            table = %config.store.table_name,
            region = %config.mailer.region,
            batch_size = config.worker.batch_size,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Reject configurations missing a required setting. A value left as an
    /// unsubstituted `${VAR}` placeholder counts as missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn required(value: &str, name: &'static str) -> Result<(), ConfigError> {
            if value.is_empty() || value.contains("${") {
                return Err(ConfigError::MissingField(name));
            }
            Ok(())
        }

        required(&self.store.table_name, "store.table_name")?;
        required(&self.mailer.from, "mailer.from")?;
        required(&self.mailer.to, "mailer.to")?;
        required(&self.mailer.region, "mailer.region")?;
        required(&self.queues.metadata, "queues.metadata")?;
        required(&self.queues.processor, "queues.processor")?;
        required(&self.queues.notifier, "queues.notifier")?;

        // The managed queue caps a single receive at 10 messages
        if self.worker.batch_size == 0 || self.worker.batch_size > 10 {
            return Err(ConfigError::ValidationError(
                "worker.batch_size must be between 1 and 10".to_string(),
            ));
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                debug!(var = %var_name, "environment variable not set, keeping placeholder");
                caps[0].to_string()
            }
        }
    })
    .to_string()
}
