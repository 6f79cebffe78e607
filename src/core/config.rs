//! Configuration for kitchen simulation execution
//!
//! This module provides configuration types for the synthetic clock cadence
//! and the assignment engine's dependency enforcement.

use crate::core::errors::{KitchenError, Result};
use crate::core::types::Timestamp;
use chrono::TimeZone;
use serde::{Deserialize, Serialize};

/// How recipe order is enforced between tasks of one order line
///
/// Explicit task dependencies are always honoured. The mode only decides what
/// happens for recipe steps that declare no dependencies of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    /// Any task without explicit dependencies is eligible as soon as it is queued
    #[default]
    Unordered,
    /// A task without explicit dependencies waits for every lower-ranked step
    /// of the same order line to complete
    RankOrdered,
}

/// Which tasks of a pinned menu item an assignment constraint governs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinScope {
    /// Every task of the item is bound only to the pinned section
    #[default]
    MenuItem,
    /// Only the item's tasks on the pinned section's station are restricted;
    /// its other steps use their own station's sections
    Station,
}

/// Synthetic clock cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Simulated instant the clock starts at
    pub start: Timestamp,
    /// Real time between two ticks, in milliseconds
    pub tick_interval_ms: u64,
    /// Simulated seconds added by every tick
    pub tick_step_seconds: i64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            tick_interval_ms: 2_000,
            tick_step_seconds: 60,
        }
    }
}

impl ClockConfig {
    /// Real-time tick interval as a `Duration`
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }
}

/// Configuration for a kitchen instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenConfig {
    /// Synthetic clock settings
    pub clock: ClockConfig,
    /// Recipe order enforcement used by the assignment engine
    pub dependency_mode: DependencyMode,
    /// Whether delayed task starts are recorded as bottleneck observations
    pub record_bottlenecks: bool,
    /// Reach of assignment constraints
    #[serde(default)]
    pub pin_scope: PinScope,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            dependency_mode: DependencyMode::default(),
            record_bottlenecks: true,
            pin_scope: PinScope::default(),
        }
    }
}

impl KitchenConfig {
    /// Create a new kitchen configuration with default values
    ///
    /// Default configuration advances one simulated minute every two real
    /// seconds and does not enforce implicit recipe order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject values the clock loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.clock.tick_interval_ms == 0 {
            return Err(KitchenError::invalid_config("tick_interval_ms must be at least 1"));
        }
        if self.clock.tick_step_seconds <= 0 {
            return Err(KitchenError::invalid_config(format!(
                "tick_step_seconds must be positive, got {}",
                self.clock.tick_step_seconds
            )));
        }
        Ok(())
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set the dependency enforcement mode
    pub fn with_dependency_mode(mut self, mode: DependencyMode) -> Self {
        self.dependency_mode = mode;
        self
    }

    /// Set the simulated start instant
    pub fn with_start(mut self, start: Timestamp) -> Self {
        self.clock.start = start;
        self
    }

    /// Set the real-time tick interval and the simulated step per tick
    pub fn with_tick(mut self, interval_ms: u64, step_seconds: i64) -> Self {
        self.clock.tick_interval_ms = interval_ms;
        self.clock.tick_step_seconds = step_seconds;
        self
    }

    /// Set how far assignment constraints reach
    pub fn with_pin_scope(mut self, scope: PinScope) -> Self {
        self.pin_scope = scope;
        self
    }

    /// Enable or disable bottleneck recording
    pub fn with_bottleneck_recording(mut self, enabled: bool) -> Self {
        self.record_bottlenecks = enabled;
        self
    }
}

fn default_start() -> Timestamp {
    chrono::Utc
        .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KitchenConfig::default();
        assert_eq!(config.dependency_mode, DependencyMode::Unordered);
        assert_eq!(config.clock.tick_interval_ms, 2_000);
        assert_eq!(config.clock.tick_step_seconds, 60);
        assert!(config.record_bottlenecks);
        assert_eq!(config.pin_scope, PinScope::MenuItem);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_clock_is_rejected() {
        let frozen = KitchenConfig::new().with_tick(100, 0);
        assert!(matches!(frozen.validate(), Err(KitchenError::InvalidConfig(_))));
        let backwards = KitchenConfig::new().with_tick(100, -60);
        assert!(backwards.validate().unwrap_err().to_string().contains("-60"));
        let busy = KitchenConfig::new().with_tick(0, 60);
        assert!(matches!(busy.validate(), Err(KitchenError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = KitchenConfig::new()
            .with_dependency_mode(DependencyMode::RankOrdered)
            .with_tick(10, 30)
            .with_bottleneck_recording(false);

        assert_eq!(config.dependency_mode, DependencyMode::RankOrdered);
        assert_eq!(config.clock.tick_interval(), std::time::Duration::from_millis(10));
        assert_eq!(config.clock.tick_step_seconds, 30);
        assert!(!config.record_bottlenecks);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "clock": {
                "start": "2024-03-01T08:00:00Z",
                "tick_interval_ms": 500,
                "tick_step_seconds": 15
            },
            "dependency_mode": "rank_ordered",
            "record_bottlenecks": false
        }"#;
        let config = KitchenConfig::from_json_str(json).unwrap();
        assert_eq!(config.dependency_mode, DependencyMode::RankOrdered);
        assert_eq!(config.clock.tick_step_seconds, 15);
        assert_eq!(config.clock.start.to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert_eq!(config.pin_scope, PinScope::MenuItem);

        let scoped = json.replace(
            r#""record_bottlenecks": false"#,
            r#""record_bottlenecks": false, "pin_scope": "station""#,
        );
        let config = KitchenConfig::from_json_str(&scoped).unwrap();
        assert_eq!(config.pin_scope, PinScope::Station);
    }

    #[test]
    fn test_missing_config_file_is_an_io_error() {
        let err = KitchenConfig::from_json_file("/nonexistent/kitchen.json").unwrap_err();
        assert!(matches!(err, KitchenError::Io(_)));
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        assert!(KitchenConfig::from_json_str("{ not json").is_err());
    }
}
