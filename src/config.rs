//! Server configuration.
//!
//! Defaults, then an optional YAML file, then environment overrides, then
//! whatever the command line supplies. [`Config::validate`] runs last.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::http::reader::{DEFAULT_CHUNK_SIZE, DEFAULT_READ_ATTEMPTS};
use crate::http::writer::DEFAULT_SEND_CHUNK_SIZE;

pub const MIN_PORT: u16 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("port {0} is outside the allowed range [1024, 65535]")]
    PortOutOfRange(u16),

    #[error("document root {} does not exist or is not a directory", .0.display())]
    DocumentRootMissing(PathBuf),

    #[error("document root {} is not readable", .0.display())]
    DocumentRootUnreadable(PathBuf),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("could not read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Pending connections the kernel queues while every slot is taken.
    pub backlog: u32,
    /// Size of the admission gate.
    pub max_connections: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub document_root: PathBuf,
    pub send_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub chunk_size: usize,
    pub read_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            backlog: 64,
            max_connections: 32,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("."),
            send_chunk_size: DEFAULT_SEND_CHUNK_SIZE,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_attempts: DEFAULT_READ_ATTEMPTS,
        }
    }
}

impl Config {
    /// Loads defaults, overlays `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// `LISTEN_HOST` and `MAX_CONNECTIONS` override the file.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("LISTEN_HOST") {
            self.server.host = host;
        }

        if let Ok(value) = std::env::var("MAX_CONNECTIONS") {
            self.server.max_connections = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "MAX_CONNECTIONS",
                value,
            })?;
        }

        Ok(())
    }

    /// Sets the port and document root, stripping a trailing separator from
    /// the latter.
    pub fn with_cli(mut self, port: u16, document_root: impl Into<PathBuf>) -> Self {
        self.server.port = port;
        self.static_files.document_root = strip_trailing_separator(document_root.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port < MIN_PORT {
            return Err(ConfigError::PortOutOfRange(self.server.port));
        }

        let root = &self.static_files.document_root;
        if !root.is_dir() {
            return Err(ConfigError::DocumentRootMissing(root.clone()));
        }
        if std::fs::read_dir(root).is_err() {
            return Err(ConfigError::DocumentRootUnreadable(root.clone()));
        }

        if self.server.max_connections == 0 {
            return Err(ConfigError::ZeroValue("server.max_connections"));
        }
        if self.server.backlog == 0 {
            return Err(ConfigError::ZeroValue("server.backlog"));
        }
        if self.static_files.send_chunk_size == 0 {
            return Err(ConfigError::ZeroValue("static_files.send_chunk_size"));
        }
        if self.reader.chunk_size == 0 {
            return Err(ConfigError::ZeroValue("reader.chunk_size"));
        }
        if self.reader.read_attempts == 0 {
            return Err(ConfigError::ZeroValue("reader.read_attempts"));
        }

        Ok(())
    }
}

/// Rebuilding from components drops any trailing separator.
fn strip_trailing_separator(path: PathBuf) -> PathBuf {
    path.components().collect()
}
