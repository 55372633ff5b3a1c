//! CLI configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (COURIER_*)
//! - TOML configuration file
//! - Command line arguments

use anyhow::{ensure, Context, Result};
use courier_protocol::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tenvis_courier_core::{ClientOptions, DEFAULT_DEDUP_CAPACITY};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base address of the message service.
    #[serde(default = "default_service_address")]
    pub service_address: String,

    /// Path of the message resource.
    #[serde(default = "default_path")]
    pub path: String,

    /// User the client acts for.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Client tuning.
    #[serde(default)]
    pub client: ClientSection,
}

/// Client tuning section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    /// Maximum number of remembered delivery ids (0 = unbounded).
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_service_address() -> String {
    std::env::var("COURIER_SERVICE_ADDRESS").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
}

fn default_path() -> String {
    std::env::var("COURIER_PATH").unwrap_or_else(|_| "/messages".to_string())
}

fn default_user_id() -> String {
    std::env::var("COURIER_USER_ID").unwrap_or_default()
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_address: default_service_address(),
            path: default_path(),
            user_id: default_user_id(),
            client: ClientSection::default(),
        }
    }
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from the first default path that exists, or
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "courier.toml",
            "/etc/courier/courier.toml",
            "~/.config/courier/courier.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let contents = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check that the configuration can address the service.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.service_address.trim().is_empty(),
            "service address is not set (COURIER_SERVICE_ADDRESS or --service-address)"
        );
        ensure!(
            !self.user_id.trim().is_empty(),
            "user id is not set (COURIER_USER_ID or --user)"
        );
        Ok(())
    }

    /// Configuration handed to the client and its channels.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.service_address, &self.path, &self.user_id)
    }

    /// Client options.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            dedup_capacity: self.client.dedup_capacity,
        }
    }
}
