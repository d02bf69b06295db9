//! Application configuration for the Sprout CLI.
//!
//! Loaded from `sprout.toml` (next to the data directory or passed with
//! `--config`); every field has a sensible default so the CLI works with no
//! configuration at all.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calendar::{Calendar, DEFAULT_UTC_OFFSET_HOURS};
use crate::error::{Result, SproutError};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding notebook JSON files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding growth template JSON files.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// UTC offset in whole hours for local-day truncation.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

fn base_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sprout")
}

fn default_data_dir() -> PathBuf {
    base_dir().join("notebooks")
}

fn default_templates_dir() -> PathBuf {
    base_dir().join("templates")
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            templates_dir: default_templates_dir(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, or defaults if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::Config`] if the file exists but cannot be read
    /// or parsed, or if the parsed values fail validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SproutError::config_with_path(format!("failed to read: {e}"), path.to_path_buf())
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            SproutError::config_with_path(format!("failed to parse: {e}"), path.to_path_buf())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values.
    pub fn validate(&self) -> Result<()> {
        if Calendar::new(self.utc_offset_hours).is_none() {
            return Err(SproutError::config(format!(
                "utc_offset_hours {} out of range [-12, 14]",
                self.utc_offset_hours
            )));
        }
        Ok(())
    }

    /// The calendar implied by the configured offset.
    #[must_use]
    pub fn calendar(&self) -> Calendar {
        Calendar::new(self.utc_offset_hours).expect("validated offset")
    }
}
