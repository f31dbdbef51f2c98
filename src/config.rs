//! Inspector configuration.
//!
//! Only `pause_on_init`, `throttle_ms`, `enable_store_tracking` and
//! `debug_logging` change engine behavior. The rest is carried for the
//! upstream wiring layer and the formatter.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Formatter verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InspectorConfig {
    /// Component names to track. Empty means all.
    pub component_include: Vec<String>,
    /// Component names never tracked. Wins over `component_include`.
    pub component_exclude: Vec<String>,
    pub log_level: LogLevel,
    pub max_inspection_depth: usize,
    pub max_string_length: usize,
    /// Start paused; nothing is recorded until `resume()`.
    pub pause_on_init: bool,
    /// Minimum interval between two emissions for one component. 0 disables throttling.
    pub throttle_ms: u64,
    /// Attribute triggers to registered stores.
    pub enable_store_tracking: bool,
    /// Trace each store lookup step.
    pub debug_logging: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            component_include: Vec::new(),
            component_exclude: Vec::new(),
            log_level: LogLevel::default(),
            max_inspection_depth: 5,
            max_string_length: 100,
            pause_on_init: false,
            throttle_ms: 0,
            enable_store_tracking: false,
            debug_logging: false,
        }
    }
}

impl InspectorConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inspection_depth == 0 {
            return Err(ConfigError::InvalidDepth);
        }
        if self.max_string_length == 0 {
            return Err(ConfigError::InvalidStringLength);
        }
        if i64::try_from(self.throttle_ms).is_err() {
            return Err(ConfigError::ThrottleOutOfRange(self.throttle_ms));
        }
        if self.component_include.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyPattern {
                list: "componentInclude",
            });
        }
        if self.component_exclude.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyPattern {
                list: "componentExclude",
            });
        }
        Ok(())
    }

    /// Throttle window, if throttling is enabled.
    ///
    /// Out-of-range values saturate to the longest window.
    pub fn throttle(&self) -> Option<TimeDelta> {
        (self.throttle_ms > 0).then(|| {
            i64::try_from(self.throttle_ms)
                .ok()
                .and_then(TimeDelta::try_milliseconds)
                .unwrap_or(TimeDelta::MAX)
        })
    }

    /// Should the wiring layer track a component with this name?
    ///
    /// Patterns are exact names, or carry a single leading or trailing `*`.
    pub fn should_track(&self, name: &str) -> bool {
        if self.component_exclude.iter().any(|p| pattern_matches(p, name)) {
            return false;
        }
        self.component_include.is_empty()
            || self.component_include.iter().any(|p| pattern_matches(p, name))
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    pattern == name
}
