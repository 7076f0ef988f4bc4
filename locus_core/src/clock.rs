// locus_core/src/clock.rs

use crate::config::ClockConfig;
use crate::error::ConfigError;
use crate::types::{nanos_to_seconds, Timestamp};

/// Maps localization-side timestamps onto the estimator's clock.
/// Implementations must be monotonic (non-decreasing).
pub trait TimeTranslation: Send + Sync {
    fn to_local_clock(&self, foreign_ns: Timestamp) -> Timestamp;

    /// The estimator ingests seconds.
    fn to_local_seconds(&self, foreign_ns: Timestamp) -> f64 {
        nanos_to_seconds(self.to_local_clock(foreign_ns))
    }
}

/// A fixed affine clock mapping: `local = offset + scale * foreign`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAligner {
    offset_ns: Timestamp,
    scale: f64,
}

impl ClockAligner {
    pub fn new(offset_ns: Timestamp, scale: f64) -> Result<Self, ConfigError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "clock.scale",
                value: scale,
            });
        }
        Ok(Self { offset_ns, scale })
    }

    pub fn from_config(config: &ClockConfig) -> Result<Self, ConfigError> {
        Self::new(config.offset_ns, config.scale)
    }

    /// Both subsystems share a clock.
    pub fn identity() -> Self {
        Self {
            offset_ns: 0,
            scale: 1.0,
        }
    }
}

impl Default for ClockAligner {
    fn default() -> Self {
        Self::identity()
    }
}

impl TimeTranslation for ClockAligner {
    fn to_local_clock(&self, foreign_ns: Timestamp) -> Timestamp {
        // Integer path keeps full nanosecond precision for the common unit-scale case.
        if self.scale == 1.0 {
            return foreign_ns.saturating_add(self.offset_ns);
        }
        let scaled = (foreign_ns as f64 * self.scale).round() as Timestamp;
        scaled.saturating_add(self.offset_ns)
    }
}
