use crate::annotations::DEFAULT_HIT_TOLERANCE_PX;
use crate::error::ConfigError;
use crate::window::{WindowLimits, DEFAULT_RESET_SECONDS, MIN_WINDOW_SECONDS, STEP_ZOOM_RATIO};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Navigator tunables, usually read from `chunkview.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub chunk_size_seconds: f64,
    pub min_window_seconds: f64,
    pub reset_window_seconds: f64,
    pub step_zoom_ratio: f64,
    pub persist_debounce_ms: u64,
    pub hit_tolerance_px: f64,
    /// LRU bound per file; `None` keeps every chunk for the session.
    pub cache_capacity_per_file: Option<usize>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            chunk_size_seconds: 10.0,
            min_window_seconds: MIN_WINDOW_SECONDS,
            reset_window_seconds: DEFAULT_RESET_SECONDS,
            step_zoom_ratio: STEP_ZOOM_RATIO,
            persist_debounce_ms: 300,
            hit_tolerance_px: DEFAULT_HIT_TOLERANCE_PX,
            cache_capacity_per_file: Some(32),
        }
    }
}

impl NavigatorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("parsing navigator config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("chunk_size_seconds", self.chunk_size_seconds),
            ("min_window_seconds", self.min_window_seconds),
            ("reset_window_seconds", self.reset_window_seconds),
            ("hit_tolerance_px", self.hit_tolerance_px),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if !self.step_zoom_ratio.is_finite() || self.step_zoom_ratio <= 1.0 {
            return Err(ConfigError::StepRatio(self.step_zoom_ratio));
        }
        Ok(())
    }

    pub fn limits(&self) -> WindowLimits {
        WindowLimits {
            min_width: self.min_window_seconds,
            reset_span: self.reset_window_seconds,
            step_ratio: self.step_zoom_ratio,
        }
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = NavigatorConfig::from_toml_str("chunk_size_seconds = 30.0\n").unwrap();
        assert_eq!(config.chunk_size_seconds, 30.0);
        assert_eq!(config.persist_debounce_ms, 300);
        assert_eq!(config.cache_capacity_per_file, Some(32));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(NavigatorConfig::from_toml_str("min_window_seconds = -1.0\n").is_err());
        assert!(NavigatorConfig::from_toml_str("step_zoom_ratio = 1.0\n").is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunkview.toml");
        std::fs::write(&path, "step_zoom_ratio = 2.0\npersist_debounce_ms = 50\n").unwrap();
        let config = NavigatorConfig::load(&path).unwrap();
        assert_eq!(config.limits().step_ratio, 2.0);
        assert_eq!(config.persist_debounce(), Duration::from_millis(50));
    }
}
