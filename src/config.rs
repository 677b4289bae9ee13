//! Emulation configuration
//!
//! Hosts embedding the core can tune geometry, encoding, scroll-back
//! retention and the coalescing timeouts through a TOML file:
//!
//! ```toml
//! lines = 40
//! columns = 80
//! encoding = "utf-8"          # or "latin-1"
//! key_bindings = "default"
//!
//! [history]
//! mode = "fixed"              # "none", "fixed", "unlimited"
//! max_lines = 10000
//!
//! [update]
//! debounce_ms = 10
//! max_latency_ms = 40
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coalesce::{DEFAULT_DEBOUNCE, DEFAULT_MAX_LATENCY};
use crate::encoding::EmulationCodec;
use crate::screen::HistoryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level emulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationConfig {
    /// Initial screen height.
    pub lines: usize,
    /// Initial screen width.
    pub columns: usize,
    /// `"utf-8"` or `"latin-1"`.
    pub encoding: String,
    /// Key-binding table name; unknown names fall back to the default table.
    pub key_bindings: String,
    pub history: HistoryConfig,
    pub update: UpdateConfig,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            lines: 40,
            columns: 80,
            encoding: "utf-8".to_string(),
            key_bindings: "default".to_string(),
            history: HistoryConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

/// Scroll-back retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// "none", "fixed" or "unlimited".
    pub mode: String,
    /// Line cap for "fixed" mode.
    pub max_lines: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            mode: "fixed".to_string(),
            max_lines: 10_000,
        }
    }
}

/// Redraw-coalescing timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub debounce_ms: u64,
    pub max_latency_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            max_latency_ms: DEFAULT_MAX_LATENCY.as_millis() as u64,
        }
    }
}

impl EmulationConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn codec(&self) -> EmulationCodec {
        match self.encoding.as_str() {
            "latin-1" | "latin1" => EmulationCodec::Latin1,
            _ => EmulationCodec::Utf8,
        }
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        match self.history.mode.as_str() {
            "none" => HistoryPolicy::None,
            "unlimited" => HistoryPolicy::Unlimited,
            _ => HistoryPolicy::Fixed {
                max_lines: self.history.max_lines,
            },
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.update.debounce_ms)
    }

    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.update.max_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_and_timings() {
        let config = EmulationConfig::default();
        assert_eq!(config.lines, 40);
        assert_eq!(config.columns, 80);
        assert_eq!(config.codec(), EmulationCodec::Utf8);
        assert_eq!(
            config.history_policy(),
            HistoryPolicy::Fixed { max_lines: 10_000 }
        );
        assert_eq!(config.debounce(), Duration::from_millis(10));
        assert_eq!(config.max_latency(), Duration::from_millis(40));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: EmulationConfig = toml::from_str(
            r#"
            encoding = "latin-1"

            [history]
            mode = "unlimited"
            "#,
        )
        .unwrap();

        assert_eq!(config.codec(), EmulationCodec::Latin1);
        assert_eq!(config.history_policy(), HistoryPolicy::Unlimited);
        assert_eq!(config.columns, 80);
        assert_eq!(config.update.max_latency_ms, 40);
    }

    #[test]
    fn unknown_history_mode_falls_back_to_fixed() {
        let config: EmulationConfig = toml::from_str(
            r#"
            [history]
            mode = "bogus"
            max_lines = 123
            "#,
        )
        .unwrap();
        assert_eq!(
            config.history_policy(),
            HistoryPolicy::Fixed { max_lines: 123 }
        );
    }
}
