//! Configuration structures for the hand controller.
//!
//! Supports TOML deserialization with defaults matching the reference
//! board (10ms cycle split into ten 1ms slots).

use crate::error::{HandError, HandResult};
use serde::{Deserialize, Serialize};
use static_assertions::{const_assert, const_assert_eq};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Default length of the main cycle in milliseconds.
pub const DEFAULT_CYCLE_LENGTH_MS: u32 = 10;

/// Default number of task slots per cycle.
pub const DEFAULT_TASK_SLOT_COUNT: u32 = 10;

// The compiled-in cycle must split into whole, non-empty microsecond slots.
const_assert!(DEFAULT_TASK_SLOT_COUNT >= 1);
const_assert!(1000 * DEFAULT_CYCLE_LENGTH_MS / DEFAULT_TASK_SLOT_COUNT >= 1);
const_assert_eq!(1000 * DEFAULT_CYCLE_LENGTH_MS % DEFAULT_TASK_SLOT_COUNT, 0);

/// Top-level controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandConfig {
    /// Cycle timing.
    pub cycle: CycleConfig,

    /// Task slot layout.
    pub tasks: TaskLayoutConfig,

    /// Diagnostics reporter configuration.
    pub diagnostics: DiagnosticsConfig,

    /// Real-time thread configuration.
    pub realtime: RealtimeConfig,

    /// Collaborator driver configuration.
    pub drivers: DriverConfig,
}

/// Cycle timing: one cycle of `cycle_length_ms` is divided into
/// `task_slot_count` equal slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Length of the main cycle in milliseconds.
    pub cycle_length_ms: u32,

    /// Number of slots the cycle is divided into.
    pub task_slot_count: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLE_LENGTH_MS, DEFAULT_TASK_SLOT_COUNT)
    }
}

impl CycleConfig {
    /// Create a cycle configuration. Call [`CycleConfig::validate`] before use.
    #[must_use]
    pub const fn new(cycle_length_ms: u32, task_slot_count: u32) -> Self {
        Self {
            cycle_length_ms,
            task_slot_count,
        }
    }

    /// Length of one slot in microseconds (`1000 * cycle_length_ms / task_slot_count`).
    ///
    /// Returns 0 for a zero slot count.
    #[must_use]
    pub const fn slot_length_us(&self) -> u32 {
        if self.task_slot_count == 0 {
            return 0;
        }
        self.cycle_length_ms.saturating_mul(1000) / self.task_slot_count
    }

    /// Number of slots as an index bound.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.task_slot_count as usize
    }

    /// Check that the cycle splits into whole slots of at least one microsecond.
    ///
    /// # Errors
    ///
    /// Returns [`HandError::InvalidCycle`] if the slot count is zero, the slot
    /// would be shorter than 1us, or the cycle does not divide evenly.
    pub fn validate(&self) -> HandResult<()> {
        let invalid = HandError::InvalidCycle {
            cycle_length_ms: self.cycle_length_ms,
            task_slot_count: self.task_slot_count,
        };

        if self.task_slot_count == 0 {
            return Err(invalid);
        }
        let Some(cycle_us) = self.cycle_length_ms.checked_mul(1000) else {
            return Err(invalid);
        };
        if cycle_us / self.task_slot_count < 1 || cycle_us % self.task_slot_count != 0 {
            return Err(invalid);
        }
        Ok(())
    }
}

/// Task bound to a slot by the daemon when composing the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Button bank debounce.
    Buttons,
    /// Potentiometer sampling.
    Potentiometer,
    /// Muscle sensor sampling.
    Sensor,
    /// Servo actuation.
    Servo,
    /// Reserved slot, does nothing.
    Idle,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buttons => write!(f, "buttons"),
            Self::Potentiometer => write!(f, "potentiometer"),
            Self::Sensor => write!(f, "sensor"),
            Self::Servo => write!(f, "servo"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Ordered slot layout. Entry `i` runs in slot `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLayoutConfig {
    /// One entry per slot.
    pub slots: Vec<TaskKind>,
}

impl Default for TaskLayoutConfig {
    fn default() -> Self {
        let mut slots = vec![
            TaskKind::Buttons,
            TaskKind::Potentiometer,
            TaskKind::Servo,
            TaskKind::Sensor,
        ];
        slots.resize(DEFAULT_TASK_SLOT_COUNT as usize, TaskKind::Idle);
        Self { slots }
    }
}

/// Output format of the diagnostics reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable tree, one line per slot.
    #[default]
    Text,
    /// One JSON object per report.
    Json,
}

/// Diagnostics reporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Run the background reporter.
    pub enabled: bool,

    /// Delay between two reports.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Report format.
    pub format: ReportFormat,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(1),
            format: ReportFormat::Text,
        }
    }
}

/// Real-time configuration for the control and diagnostics threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Apply real-time settings at startup.
    pub enabled: bool,

    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,

    /// CPU the busy-poll control loop is pinned to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_cpu: Option<usize>,

    /// CPU the diagnostics reporter is pinned to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics_cpu: Option<usize>,

    /// Fail startup if a real-time setting cannot be applied.
    pub fail_fast: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lock_memory: true,
            control_cpu: None,
            diagnostics_cpu: None,
            fail_fast: false,
        }
    }
}

/// Where the servo takes its set-point from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// Potentiometer on the development board.
    #[default]
    Potentiometer,
    /// Muscle sensor.
    Sensor,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Potentiometer => write!(f, "potentiometer"),
            Self::Sensor => write!(f, "sensor"),
        }
    }
}

/// Collaborator driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Override the DIP switch signal source selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_source: Option<SignalSource>,

    /// Consecutive identical samples before a button state change is accepted.
    pub debounce_samples: u8,

    /// Exponential smoothing shift for analog inputs (0 disables smoothing).
    pub smoothing_shift: u8,

    /// Servo output configuration.
    pub servo: ServoConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            signal_source: None,
            debounce_samples: 5,
            smoothing_shift: 2,
            servo: ServoConfig::default(),
        }
    }
}

/// Servo pulse range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Pulse width at the lowest signal value.
    pub min_pulse_us: u16,

    /// Pulse width at the highest signal value.
    pub max_pulse_us: u16,

    /// Swap the direction of travel.
    pub inverted: bool,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_pulse_us: 500,
            max_pulse_us: 2500,
            inverted: false,
        }
    }
}

impl HandConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        debug!(?path, "Reading configuration file");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check values that can be validated without building the scheduler.
    ///
    /// Slot layout cardinality is checked when the scheduler is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid cycle or servo pulse range.
    pub fn validate(&self) -> HandResult<()> {
        self.cycle.validate()?;

        let servo = &self.drivers.servo;
        if servo.min_pulse_us >= servo.max_pulse_us {
            return Err(HandError::Config(format!(
                "servo pulse range {}..{}us is empty",
                servo.min_pulse_us, servo.max_pulse_us
            )));
        }
        if self.drivers.smoothing_shift > 15 {
            return Err(HandError::Config(format!(
                "smoothing_shift {} exceeds the 12-bit sample width",
                self.drivers.smoothing_shift
            )));
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
