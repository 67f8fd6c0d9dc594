//! Configuration module for housecup-server.
//!
//! Handles loading configuration from the TOML file and CLI overrides, and
//! validates it into the types the core components use.

pub mod file;

use crate::config::file::FileConfig;
use axum::http::HeaderValue;
use housecup_core::config::StreamConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Origins allowed to make cross-origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

impl AllowedOrigins {
    fn parse(origins: &[String]) -> Result<Self, ConfigError> {
        if origins.iter().any(|o| o.trim() == "*") {
            return Ok(AllowedOrigins::Any);
        }
        origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o.trim().trim_end_matches('/')).map_err(|_| {
                    ConfigError::ValidationError(format!("invalid allowed origin: {o:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AllowedOrigins::List)
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub allowed_origins: AllowedOrigins,
    pub database_url: String,
    pub stream: StreamConfig,
    pub subscriber_buffer: usize,
    pub autostart: bool,
}

/// Reads the config file and applies CLI overrides.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
    database_url_override: Option<String>,
}

impl ConfigLoader {
    pub fn new(
        config_path: impl AsRef<Path>,
        listen_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            database_url_override,
        }
    }

    /// Load and validate the configuration.
    ///
    /// A missing file is not an error: every setting falls back to its
    /// default.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str::<FileConfig>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    "Config file not found, using defaults"
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(url) = &self.database_url_override {
            file_config.database.url = url.clone();
        }

        Self::validate(file_config)
    }

    /// Reload the configuration (used on SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        if config.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database url must not be empty".to_string(),
            ));
        }
        if config.stream.subscriber_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "stream.subscriber_buffer must be at least 1".to_string(),
            ));
        }
        let allowed_origins = AllowedOrigins::parse(&config.server.allowed_origins)?;
        let stream = StreamConfig::new(
            Duration::from_millis(config.stream.min_delay_ms),
            Duration::from_millis(config.stream.max_delay_ms),
        )
        .map_err(|e| ConfigError::ValidationError(format!("stream: {e}")))?;

        Ok(LoadedConfig {
            listen: config.server.listen,
            allowed_origins,
            database_url: config.database.url,
            stream,
            subscriber_buffer: config.stream.subscriber_buffer,
            autostart: config.stream.autostart,
        })
    }
}
