//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, request timeout, refresh de-duplication, where the
//! session is persisted, and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/tutorlink/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::gateway::{DEFAULT_API_URL, DEFAULT_SIGN_IN_PATH, REQUEST_TIMEOUT_SECS};
use crate::api::GatewayOptions;
use crate::auth::{CredentialStorage, FileStorage, KeyringStorage, MemoryStorage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "tutorlink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides `api_url`
pub const API_URL_ENV: &str = "TUTORLINK_API_URL";

/// Where the credential document is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub dedupe_refresh: bool,
    pub storage: StorageBackend,
    pub sign_in_path: String,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            dedupe_refresh: true,
            storage: StorageBackend::default(),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply `TUTORLINK_API_URL`.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_api_url_override(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session for `StorageBackend::File`.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Empty or whitespace-only values are ignored.
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            base_url: self.api_url.clone(),
            request_timeout: self.request_timeout(),
            dedupe_refresh: self.dedupe_refresh,
            sign_in_path: self.sign_in_path.clone(),
        }
    }

    pub fn credential_storage(&self) -> Result<Arc<dyn CredentialStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(Self::data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::default()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.api_url, "http://127.0.0.1:8000/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.dedupe_refresh);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            storage: StorageBackend::Keyring,
            last_email: Some("a@b.com".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");
        assert_eq!(Config::load_from(&path).expect("load"), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage": "memory", "request_timeout_secs": 5}"#).expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.sign_in_path, "/login");
    }

    #[test]
    fn test_api_url_override() {
        let mut config = Config::default();
        config.apply_api_url_override(Some("   ".to_string()));
        assert_eq!(config.api_url, DEFAULT_API_URL);

        config.apply_api_url_override(Some("https://api.example.com/api".to_string()));
        assert_eq!(config.api_url, "https://api.example.com/api");

        let options = config.gateway_options();
        assert_eq!(options.base_url, "https://api.example.com/api");
        assert!(options.dedupe_refresh);
    }

    #[test]
    fn test_data_dir_and_config_path_share_app_dir() {
        // No home directory on some CI runners
        let (Ok(data), Ok(config)) = (Config::data_dir(), Config::config_path()) else {
            return;
        };
        assert!(data.ends_with(APP_NAME));
        assert_eq!(config.parent().and_then(|p| p.file_name()), Some(std::ffi::OsStr::new(APP_NAME)));
    }
}
