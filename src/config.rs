//! # Configuration Management
//!
//! This module handles loading application configuration from multiple sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml, optional)
//! - Environment variables (with APP_ prefix)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms set these)
//! 2. Environment variables (APP_SERVER__PORT, APP_STORAGE__UPLOAD_DIR, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Nested keys are separated by a double underscore so that field names that
//! themselves contain underscores (`upload_dir`, `max_upload_bytes`) survive.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transcriber: TranscriberConfig,
}

/// HTTP listener settings.
///
/// ## Fields:
/// - `host`: address to bind (`0.0.0.0` accepts connections from anywhere)
/// - `port`: TCP port to listen on
/// - `max_upload_bytes`: largest request body accepted on `/transcribe`;
///   bigger bodies are rejected by actix with 413
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Where uploads and transcripts land.
///
/// A single flat directory holds both the uploaded audio and the `.json`
/// transcript the tool writes next to it. Nothing is ever cleaned up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

/// How the external transcription executable is invoked.
///
/// The command line is
/// `<executable> <file> --model <model> --output_format <output_format> --output_dir <upload_dir>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Program name or path (looked up on `PATH` when not absolute)
    pub executable: String,
    /// Model size selector passed to `--model`
    pub model: String,
    /// Output format selector passed to `--output_format`
    pub output_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
                max_upload_bytes: 512 * 1024 * 1024, // 512 MiB
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("/app/uploads"),
            },
            transcriber: TranscriberConfig::default(),
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            executable: "whisper".to_string(),
            model: "small".to_string(),
            output_format: "json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=8080`: Override server port
    /// - `APP_STORAGE__UPLOAD_DIR=/tmp/uploads`: Override the upload directory
    /// - `APP_TRANSCRIBER__MODEL=medium`: Use a bigger model
    /// - `HOST=127.0.0.1` / `PORT=8080`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(anyhow!("Max upload size must be greater than 0"));
        }

        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(anyhow!("Upload directory cannot be empty"));
        }

        if self.transcriber.executable.trim().is_empty() {
            return Err(anyhow!("Transcriber executable cannot be empty"));
        }

        if self.transcriber.model.trim().is_empty() {
            return Err(anyhow!("Transcriber model cannot be empty"));
        }

        if self.transcriber.output_format.trim().is_empty() {
            return Err(anyhow!("Transcriber output format cannot be empty"));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.storage.upload_dir, PathBuf::from("/app/uploads"));
        assert_eq!(config.transcriber.executable, "whisper");
        assert_eq!(config.transcriber.model, "small");
        assert_eq!(config.transcriber.output_format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transcriber.executable = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.upload_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_survive_config_round_trip() {
        let built = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).unwrap())
            .set_override("transcriber.model", "medium")
            .unwrap()
            .build()
            .unwrap();
        let config: AppConfig = built.try_deserialize().unwrap();

        assert_eq!(config.transcriber.model, "medium");
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.bind_addr(), "0.0.0.0:5001");
    }
}
