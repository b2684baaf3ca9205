//! Tuning knobs for the trimmer, loadable from a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};

/// Trimmer configuration
///
/// Every field has a default, so a config file only needs the values it
/// wants to override:
///
/// ```
/// use trim_wizard_lib::config::TrimConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TrimConfig::from_json(r#"{ "bar_count": 120 }"#)?;
/// assert_eq!(config.bar_count, 120);
/// assert_eq!(config.fallback_duration_secs, 60.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Number of waveform bars rendered
    pub bar_count: usize,

    /// Duration used when neither the adapter nor the catalog knows one
    pub fallback_duration_secs: f64,

    /// Selection length applied when a new track is chosen
    pub default_selection_secs: f64,

    /// Smallest gap the drag handles may leave between start and end
    pub min_selection_secs: f64,

    /// How long a load may stay in `loading` before it counts as stalled
    pub stall_timeout_ms: u64,

    /// Cadence of time updates from the device player
    pub time_update_interval_ms: u64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            bar_count: 80,
            fallback_duration_secs: 60.0,
            default_selection_secs: 15.0,
            min_selection_secs: 0.5,
            stall_timeout_ms: 15_000,
            time_update_interval_ms: 50,
        }
    }
}

impl TrimConfig {
    /// Parse and validate a JSON config document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: TrimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| WizardError::FileOpen {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bar_count == 0 {
            return Err(WizardError::Config("bar_count must be greater than 0".to_string()));
        }
        let positive = [
            ("fallback_duration_secs", self.fallback_duration_secs),
            ("default_selection_secs", self.default_selection_secs),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(WizardError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !(self.min_selection_secs.is_finite() && self.min_selection_secs >= 0.0) {
            return Err(WizardError::Config(format!(
                "min_selection_secs cannot be negative: {}",
                self.min_selection_secs
            )));
        }
        if self.time_update_interval_ms == 0 {
            return Err(WizardError::Config(
                "time_update_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn time_update_interval(&self) -> Duration {
        Duration::from_millis(self.time_update_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bar_count, 80);
        assert_eq!(config.stall_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TrimConfig::from_json(r#"{ "stall_timeout_ms": 500 }"#).unwrap();
        assert_eq!(config.stall_timeout_ms, 500);
        assert_eq!(config.default_selection_secs, 15.0);
    }

    #[test]
    fn test_rejects_zero_bars() {
        let result = TrimConfig::from_json(r#"{ "bar_count": 0 }"#);
        assert!(matches!(result, Err(WizardError::Config(_))));
    }

    #[test]
    fn test_rejects_negative_fallback() {
        let result = TrimConfig::from_json(r#"{ "fallback_duration_secs": -1.0 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_validates_file() {
        let path = std::env::temp_dir().join("trim_wizard_config_invalid.json");
        std::fs::write(&path, r#"{ "default_selection_secs": 0.0 }"#).unwrap();

        let result = TrimConfig::load(&path);
        assert!(matches!(result, Err(WizardError::Config(_))));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = TrimConfig::load("/nonexistent/trim-config.json");
        assert!(matches!(result, Err(WizardError::FileOpen { .. })));
    }
}
