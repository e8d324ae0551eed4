//! Configuration management for Retro.
//!
//! Loads configuration from ${RETRO_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config template with comments, embedded at compile time.
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../default_config.toml");

pub mod paths {
    //! Path resolution for Retro configuration and data directories.
    //!
    //! RETRO_HOME resolution order:
    //! 1. RETRO_HOME environment variable (if set)
    //! 2. ~/.config/retro (default)

    use std::path::PathBuf;

    /// Returns the Retro home directory.
    ///
    /// Checks RETRO_HOME env var first, falls back to ~/.config/retro
    /// (or `.retro` in the working directory when there is no home).
    pub fn retro_home() -> PathBuf {
        if let Ok(home) = std::env::var("RETRO_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".retro"),
            |h| h.join(".config").join("retro"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        retro_home().join("config.toml")
    }

    /// Returns the default directory for the room store.
    pub fn data_dir() -> PathBuf {
        retro_home().join("data")
    }

    /// Returns the directory for log files.
    pub fn logs_dir() -> PathBuf {
        retro_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the agent backend
    pub api_base_url: Option<String>,

    /// Agent used when the backend has no agent list
    pub default_agent: String,

    /// Model name sent with every chat request
    pub model: String,

    /// Optional backend bucket each exchange is also saved to
    pub save_to: Option<String>,

    /// Timeout for backend requests in seconds (0 disables)
    pub request_timeout_secs: u32,

    /// Optional override of the room store directory
    pub data_dir: Option<String>,
}

impl Config {
    const DEFAULT_AGENT: &'static str = "yapper";
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only the model field to the config file.
    pub fn save_model(model: &str) -> Result<()> {
        Self::save_model_to(&paths::config_path(), model)
    }

    /// Saves only the model field to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            DEFAULT_CONFIG_TEMPLATE.to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["model"] = value(model);

        Self::write_config(path, &doc.to_string())
    }

    /// Returns the configured backend base URL, if set.
    /// Empty strings are treated as unset.
    pub fn effective_api_base_url(&self) -> Option<&str> {
        self.api_base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// Returns the configured save bucket, if set and non-empty.
    pub fn effective_save_to(&self) -> Option<&str> {
        self.save_to
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }

    /// Directory holding the room store.
    pub fn effective_data_dir(&self) -> PathBuf {
        match self.data_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => paths::data_dir(),
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, DEFAULT_CONFIG_TEMPLATE)
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            default_agent: Self::DEFAULT_AGENT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            save_to: None,
            request_timeout_secs: 0,
            data_dir: None,
        }
    }
}
