//! TOML file configuration structures.
//!
//! These structs map directly to the `housecup.toml` file format. Every
//! section and field is optional.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8000").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Browser origins allowed to call the API cross-origin (frontend URLs).
    /// `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000))
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Database configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL. The file is created if missing.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://housecup.db".to_string()
}

/// Event stream section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Lower bound of the wait between events, in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Upper bound of the wait between events, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Updates queued per session before that session starts missing them.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Start the stream at boot instead of waiting for a `start` command.
    #[serde(default)]
    pub autostart: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            subscriber_buffer: default_subscriber_buffer(),
            autostart: false,
        }
    }
}

fn default_min_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_subscriber_buffer() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
allowed_origins = ["https://cup.example.com"]

[database]
url = "sqlite:///var/lib/housecup/points.db"

[stream]
min_delay_ms = 100
max_delay_ms = 250
subscriber_buffer = 16
autostart = true
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.allowed_origins, vec!["https://cup.example.com"]);
        assert_eq!(config.database.url, "sqlite:///var/lib/housecup/points.db");
        assert_eq!(config.stream.min_delay_ms, 100);
        assert_eq!(config.stream.max_delay_ms, 250);
        assert_eq!(config.stream.subscriber_buffer, 16);
        assert!(config.stream.autostart);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: FileConfig = toml::from_str("[stream]\nautostart = true\n").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.server.allowed_origins, vec!["*"]);
        assert_eq!(config.database.url, "sqlite://housecup.db");
        assert_eq!(config.stream.min_delay_ms, 500);
        assert_eq!(config.stream.max_delay_ms, 2000);
        assert_eq!(config.stream.subscriber_buffer, 64);
        assert!(config.stream.autostart);

        let empty: FileConfig = toml::from_str("").unwrap();
        assert!(!empty.stream.autostart);
        assert_eq!(empty.server.listen.port(), 8000);
    }
}
