//! Configuration - file first, environment overrides
//!
//! Every field has a default so an empty or missing file still yields a
//! usable configuration. The API key only ever comes from the environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const API_KEY_VARS: &[&str] = &["CONCIERGE_API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("lookupConcurrency must be at least 1")]
    ZeroConcurrency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConciergeConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_max_output_tokens() -> u32 { 8192 }
fn default_lookup_concurrency() -> usize { 4 }

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            max_output_tokens: default_max_output_tokens(),
            lookup_concurrency: default_lookup_concurrency(),
            api_key: None,
        }
    }
}

impl ConciergeConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = API_KEY_VARS.iter().find_map(|k| get(*k)) {
            self.api_key = Some(key);
        }
        if let Some(model) = get("CONCIERGE_TEXT_MODEL") {
            info!(old = %self.text_model, new = %model, "Overriding text model via ENV");
            self.text_model = model;
        }
        if let Some(model) = get("CONCIERGE_IMAGE_MODEL") {
            info!(old = %self.image_model, new = %model, "Overriding image model via ENV");
            self.image_model = model;
        }
        if let Some(url) = get("CONCIERGE_API_BASE_URL") {
            info!(new = %url, "Overriding API base URL via ENV");
            self.api_base_url = url;
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.lookup_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}
