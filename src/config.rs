// FILE: src/config.rs
//! Runtime configuration.
//!
//! Loaded from JSON (explicit path or `<config_dir>/tripscout/config.json`),
//! then overridden by environment variables. Every field has a default, so an
//! empty file or no file at all is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_KEY: &str = "TRIPSCOUT_API_KEY";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_PLACES_API_KEY";
pub const ENV_PROVIDER: &str = "TRIPSCOUT_PROVIDER";

/// Which upstream interface(s) the engine may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Prefer the unified search API, fall back to legacy when it is unavailable.
    #[default]
    Auto,
    Current,
    Legacy,
}

impl std::str::FromStr for ProviderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "current" | "new" => Ok(Self::Current),
            "legacy" => Ok(Self::Legacy),
            other => anyhow::bail!("Unknown provider mode '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    pub api_key: Option<String>,
    pub provider: ProviderMode,
    pub current_base_url: String,
    pub legacy_base_url: String,
    pub language: Option<String>,
    pub region: Option<String>,
    pub request_timeout_secs: u64,

    pub nearby_debounce_ms: u64,
    pub autocomplete_debounce_ms: u64,
    pub autocomplete_min_chars: usize,

    pub search_cache_ttl_secs: u64,
    pub details_cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub cache_evict_batch: usize,

    pub quota_retry_delay_ms: u64,
    pub default_radius_m: f64,
    pub max_radius_m: f64,
    pub metrics_window: usize,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderMode::Auto,
            current_base_url: "https://places.googleapis.com/v1".to_string(),
            legacy_base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            language: None,
            region: None,
            request_timeout_secs: 10,
            nearby_debounce_ms: 300,
            autocomplete_debounce_ms: 150,
            autocomplete_min_chars: 2,
            search_cache_ttl_secs: 90,
            details_cache_ttl_secs: 12 * 60,
            cache_capacity: 50,
            cache_evict_batch: 10,
            quota_retry_delay_ms: 1500,
            default_radius_m: 5_000.0,
            max_radius_m: 50_000.0,
            metrics_window: 100,
        }
    }
}

impl PlacesConfig {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tripscout").join("config.json"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).context("Failed to parse tripscout config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the cache and the area policy cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_radius_m.is_nan() || self.max_radius_m < 1.0 {
            anyhow::bail!("max_radius_m must be at least 1 (got {})", self.max_radius_m);
        }
        if self.default_radius_m.is_nan() || self.default_radius_m <= 0.0 {
            anyhow::bail!("default_radius_m must be positive (got {})", self.default_radius_m);
        }
        if self.cache_capacity == 0 {
            anyhow::bail!("cache_capacity must be at least 1");
        }
        if self.cache_evict_batch == 0 {
            anyhow::bail!("cache_evict_batch must be at least 1");
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&content)
    }

    /// File (explicit or default location) + environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).or_else(|| lookup(ENV_GOOGLE_API_KEY)) {
            if !key.trim().is_empty() {
                self.api_key = Some(key.trim().to_string());
            }
        }
        if let Some(mode) = lookup(ENV_PROVIDER) {
            self.provider = mode.parse()?;
        }
        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn nearby_debounce(&self) -> Duration {
        Duration::from_millis(self.nearby_debounce_ms)
    }

    pub fn autocomplete_debounce(&self) -> Duration {
        Duration::from_millis(self.autocomplete_debounce_ms)
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }

    pub fn details_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.details_cache_ttl_secs)
    }

    pub fn quota_retry_delay(&self) -> Duration {
        Duration::from_millis(self.quota_retry_delay_ms)
    }
}
