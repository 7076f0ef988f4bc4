// locus_core/src/pose_buffer.rs

use std::collections::VecDeque;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::PoseBufferConfig;
use crate::transforms::interpolate_pose;
use crate::types::{seconds_to_nanos, Pose, PoseSample, Timestamp};

/// Result of a point-in-time query against the estimator's pose history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseLookup {
    /// The pose at exactly the requested time (interpolated between neighbours if needed).
    Available(Pose),
    /// Newer than anything stored yet. Retrying later may succeed.
    NotYetAvailable,
    /// Evicted, or too far from any stored sample. Retrying will not help.
    NeverAvailable,
}

impl PoseLookup {
    pub fn pose(&self) -> Option<Pose> {
        match self {
            PoseLookup::Available(pose) => Some(*pose),
            _ => None,
        }
    }
}

/// A bounded, time-ordered history of `T_M_I` poses, shared between the
/// estimator's output thread (writer) and the localization thread (readers).
#[derive(Debug)]
pub struct PoseLookupBuffer {
    retention_ns: Timestamp,
    max_propagation_ns: Timestamp,
    samples: RwLock<VecDeque<PoseSample>>,
}

impl PoseLookupBuffer {
    pub fn new(retention_ns: Timestamp, max_propagation_ns: Timestamp) -> Self {
        assert!(retention_ns > 0, "PoseLookupBuffer: retention must be positive");
        assert!(
            max_propagation_ns > 0,
            "PoseLookupBuffer: max propagation must be positive"
        );
        Self {
            retention_ns,
            max_propagation_ns,
            samples: RwLock::new(VecDeque::new()),
        }
    }

    pub fn from_config(config: &PoseBufferConfig) -> Self {
        Self::new(
            seconds_to_nanos(config.retention_s),
            seconds_to_nanos(config.max_propagation_s),
        )
    }

    /// Appends a sample and evicts everything older than the retention window.
    /// Out-of-order samples are dropped; a repeated timestamp replaces the newest sample.
    /// Returns whether the sample was stored.
    pub fn insert(&self, sample: PoseSample) -> bool {
        let mut samples = self.samples.write();

        if let Some(newest) = samples.back_mut() {
            if sample.timestamp_ns < newest.timestamp_ns {
                debug!(
                    "Dropping out-of-order pose at t = {}ns (newest is {}ns).",
                    sample.timestamp_ns, newest.timestamp_ns
                );
                return false;
            }
            if sample.timestamp_ns == newest.timestamp_ns {
                *newest = sample;
                return true;
            }
        }

        samples.push_back(sample);
        let floor = sample.timestamp_ns.saturating_sub(self.retention_ns);
        while samples.front().is_some_and(|s| s.timestamp_ns < floor) {
            samples.pop_front();
        }
        true
    }

    pub fn lookup(&self, timestamp_ns: Timestamp) -> PoseLookup {
        // Copy the bracketing samples out, then interpolate without holding the lock.
        let (before, after) = {
            let samples = self.samples.read();
            let (Some(oldest), Some(newest)) = (samples.front(), samples.back()) else {
                return PoseLookup::NotYetAvailable;
            };
            if timestamp_ns > newest.timestamp_ns {
                return PoseLookup::NotYetAvailable;
            }
            if timestamp_ns < oldest.timestamp_ns {
                return PoseLookup::NeverAvailable;
            }

            let idx = samples.partition_point(|s| s.timestamp_ns < timestamp_ns);
            let after = samples[idx];
            if after.timestamp_ns == timestamp_ns {
                return PoseLookup::Available(after.pose);
            }
            (samples[idx - 1], after)
        };

        let to_nearest = (timestamp_ns - before.timestamp_ns).min(after.timestamp_ns - timestamp_ns);
        if to_nearest > self.max_propagation_ns {
            return PoseLookup::NeverAvailable;
        }

        let span = (after.timestamp_ns - before.timestamp_ns) as f64;
        let alpha = (timestamp_ns - before.timestamp_ns) as f64 / span;
        PoseLookup::Available(interpolate_pose(&before.pose, &after.pose, alpha))
    }

    pub fn retention_ns(&self) -> Timestamp {
        self.retention_ns
    }

    pub fn newest_available_timestamp(&self) -> Option<Timestamp> {
        self.samples.read().back().map(|s| s.timestamp_ns)
    }

    pub fn oldest_available_timestamp(&self) -> Option<Timestamp> {
        self.samples.read().front().map(|s| s.timestamp_ns)
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}
