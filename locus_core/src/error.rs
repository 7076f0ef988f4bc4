// locus_core/src/error.rs

use crate::types::Timestamp;
use thiserror::Error;

/// Why a localization observation was not applied. Every variant is recoverable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocalizationError {
    #[error("no estimator pose available yet at t = {timestamp_ns}ns")]
    PoseNotYetAvailable { timestamp_ns: Timestamp },

    #[error("estimator pose at t = {timestamp_ns}ns will never be available")]
    PoseNeverAvailable { timestamp_ns: Timestamp },

    #[error("localization at t = {timestamp_ns}ns is further ahead of the newest estimator pose than the retention window")]
    BeyondPoseHorizon { timestamp_ns: Timestamp },

    #[error("collecting baseframe estimates ({collected}/{required})")]
    CollectingEstimates { collected: usize, required: usize },

    #[error("too few baseframe inliers ({inliers}/{samples}, need {required})")]
    InsufficientConsensus {
        inliers: usize,
        samples: usize,
        required: usize,
    },

    #[error("no baseframe has been established yet")]
    NoBaseframe,

    #[error("localization rejected: {0}")]
    QualityRejected(#[from] QualityRejection),

    #[error("estimator rejected the update at t = {timestamp_ns}ns")]
    EstimatorRejected { timestamp_ns: Timestamp },
}

/// The specific quality check a correction failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QualityRejection {
    #[error("no localization matches for active sensors")]
    NoActiveMatches,

    #[error(
        "only {success_rate:.2} of the matches could be reprojected ({valid} valid, need more than {min_valid})"
    )]
    ReprojectionFailed {
        success_rate: f64,
        valid: usize,
        min_valid: usize,
    },

    #[error("mean reprojection error difference {difference_px:.1}px exceeds {threshold_px:.1}px")]
    ReprojectionErrorTooLarge {
        difference_px: f64,
        threshold_px: f64,
    },

    #[error("gravity disparity {angle_deg:.1}deg exceeds {threshold_deg:.1}deg")]
    GravityMisaligned { angle_deg: f64, threshold_deg: f64 },
}

/// Invalid configuration values. Returned from validation and constructors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be positive and finite (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("`{field}` must lie in (0, 1] (got {value})")]
    NotARatio { field: &'static str, value: f64 },

    #[error("`{field}` must be at least {min} (got {value})")]
    TooSmall {
        field: &'static str,
        value: usize,
        min: usize,
    },

    #[error("sensor {index} is mapped more than once on the {side} side")]
    DuplicateSensorMapping { side: &'static str, index: usize },

    #[error("no camera configured for localization sensor {0}")]
    MissingCamera(usize),
}
