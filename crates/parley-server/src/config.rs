//! Server configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. `PARLEY_*` environment variables (`PARLEY_PORT`, `PARLEY_DATABASE__PATH`, ...)
//! 4. command line flags
//!
//! # Example
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3001
//! allowed_origin = "http://localhost:3000"
//! queue_capacity = 256
//!
//! [database]
//! path = "data/parley.db"
//!
//! [log]
//! format = "json"
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use parley_chat::DEFAULT_QUEUE_CAPACITY;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PARLEY";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. In-memory storage when unset.
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: Option<String>,
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Origin allowed by CORS. Any origin when unset.
    pub allowed_origin: Option<String>,
    /// Outbound event queue capacity per session
    pub queue_capacity: usize,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origin: Some("http://localhost:3000".to_string()),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(
        path: Option<&Path>,
        env: Environment,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.add_source(env).build()?.try_deserialize()
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        info!("Listening on {}:{}", self.host, self.port);
        match &self.database.path {
            Some(path) => info!("Database: {}", path.display()),
            None => info!("Database: in-memory (development mode)"),
        }
        match &self.allowed_origin {
            Some(origin) => info!("CORS origin: {}", origin),
            None => info!("CORS origin: any"),
        }
        info!("Session queue capacity: {}", self.queue_capacity);
        info!("Log format: {}", self.log.format);
    }

    /// Configuration for tests: in-memory store, ephemeral port.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origin: None,
            queue_capacity: 16,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3001);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_file_then_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "port = 4000\nqueue_capacity = 8\n[database]\npath = \"chat.db\"\n[log]\nformat = \"json\""
        )
        .unwrap();

        let config =
            ServerConfig::load_with_env(Some(file.path()), env(&[("PARLEY_PORT", "5000")]))
                .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.database.path, Some(PathBuf::from("chat.db")));
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result =
            ServerConfig::load_with_env(Some(Path::new("/nonexistent/parley.toml")), env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig::test();
        assert_eq!(config.bind_addr().unwrap().port(), 0);
    }
}
