// locus_core/src/types.rs

use nalgebra::Isometry3;

// --- Core Type Aliases ---

/// A rigid transform. Naming follows `T_A_B`: maps points from frame B into frame A.
pub type Pose = Isometry3<f64>;

/// Integer nanoseconds. Which clock it belongs to depends on context.
pub type Timestamp = i64;

/// Index of a sensor (camera) as numbered by one of the two subsystems.
pub type SensorIndex = usize;

pub const NANOS_PER_SECOND: f64 = 1e9;

pub fn seconds_to_nanos(seconds: f64) -> Timestamp {
    (seconds * NANOS_PER_SECOND).round() as Timestamp
}

pub fn nanos_to_seconds(nanos: Timestamp) -> f64 {
    nanos as f64 / NANOS_PER_SECOND
}

// --- Core Samples ---

/// One output of the onboard estimator: the body pose `T_M_I` in its drifting local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Estimator clock.
    pub timestamp_ns: Timestamp,
    pub pose: Pose,
}

impl PoseSample {
    pub fn new(timestamp_ns: Timestamp, pose: Pose) -> Self {
        Self { timestamp_ns, pose }
    }
}
