//! Playground configuration file.
//!
//! ```toml
//! uri = "mongodb://localhost/playground"
//! database = "playground"
//! server_selection_timeout_ms = 5000
//! app_name = "docmodel-playground"
//!
//! [logging]
//! level = "info"
//! format = "human"
//! ```
//!
//! Every key is optional. Command-line flags and environment variables take precedence.

use std::{path::Path, time::Duration};

use docmodel::ConnectOptions;
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogFormat;

pub const DEFAULT_URI: &str = "mongodb://localhost/playground";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaygroundConfig {
    pub uri: String,
    pub database: Option<String>,
    pub server_selection_timeout_ms: Option<u64>,
    pub app_name: Option<String>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: None,
            server_selection_timeout_ms: None,
            app_name: Some(env!("CARGO_PKG_NAME").to_string()),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl PlaygroundConfig {
    pub fn from_toml_str(path: &str, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: display.clone(), source })?;

        Self::from_toml_str(&display, &contents)
    }

    /// Backend options for [`docmodel::connect_with`].
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            database: self.database.clone(),
            server_selection_timeout: self.server_selection_timeout_ms.map(Duration::from_millis),
            app_name: self.app_name.clone(),
        }
    }
}
