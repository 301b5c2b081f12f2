//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the remote service endpoint, the storage bucket for
//! exercise photos, and an optional data-directory override.
//!
//! Configuration is stored at `~/.config/liftlog/config.json`. The endpoint
//! and API key can also come from the environment (`LIFTLOG_REMOTE_URL`,
//! `LIFTLOG_API_KEY`), which takes precedence over the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "liftlog";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default bucket for exercise photo uploads
const DEFAULT_STORAGE_BUCKET: &str = "exercise-photos";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub remote_url: Option<String>,
    pub storage_bucket: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the staging store lives.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Remote endpoint, environment taking precedence over the file.
    pub fn remote_url(&self) -> Option<String> {
        std::env::var("LIFTLOG_REMOTE_URL")
            .ok()
            .or_else(|| self.remote_url.clone())
    }

    /// API key for the remote service. Deliberately never stored in the
    /// config file.
    pub fn api_key() -> Option<String> {
        std::env::var("LIFTLOG_API_KEY").ok()
    }

    pub fn storage_bucket(&self) -> String {
        self.storage_bucket
            .clone()
            .unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string())
    }
}
