// locus_core/src/config.rs

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{seconds_to_nanos, SensorIndex};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// How accepted localizations are handed to the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizationMode {
    /// 6-DoF pose updates with a fixed covariance.
    #[default]
    DirectPose,
    /// 2D-3D landmark correspondences, gated on reprojection error.
    StructureCorrespondence,
}

/// # LocalizationConfig
/// Every tunable of the fusion core. Missing TOML sections fall back to defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalizationConfig {
    pub mode: LocalizationMode,
    /// The estimator anchors itself, so baseframe initialization is skipped and
    /// every observation is a correction. Unset means "only in direct-pose mode".
    pub estimator_handles_anchoring: Option<bool>,
    /// Apply a pose update when only inactive sensors produced matches.
    pub use_direct_pose_for_inactive_sensors: bool,
    /// Queue observations that are newer than the newest estimator pose.
    pub buffer_pending_localizations: bool,
    /// Fall back to NotLocalized when a correction fails the quality checks.
    pub demote_on_quality_rejection: bool,
    /// Gravity consistency check; disabled when unset.
    pub max_gravity_misalignment_deg: Option<f64>,
    pub clock: ClockConfig,
    pub pose_buffer: PoseBufferConfig,
    pub baseframe: BaseframeConfig,
    pub reprojection: ReprojectionConfig,
    pub correction: CorrectionCovarianceConfig,
    /// Pairs of `[localization_sensor, estimator_sensor]`.
    pub active_sensors: Vec<[SensorIndex; 2]>,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            mode: LocalizationMode::default(),
            estimator_handles_anchoring: None,
            use_direct_pose_for_inactive_sensors: false,
            buffer_pending_localizations: false,
            demote_on_quality_rejection: true,
            max_gravity_misalignment_deg: None,
            clock: ClockConfig::default(),
            pose_buffer: PoseBufferConfig::default(),
            baseframe: BaseframeConfig::default(),
            reprojection: ReprojectionConfig::default(),
            correction: CorrectionCovarianceConfig::default(),
            active_sensors: vec![[0, 0]],
        }
    }
}

impl LocalizationConfig {
    pub fn skips_initialization(&self) -> bool {
        self.estimator_handles_anchoring
            .unwrap_or(self.mode == LocalizationMode::DirectPose)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(deg) = self.max_gravity_misalignment_deg {
            positive("max_gravity_misalignment_deg", deg)?;
        }
        self.clock.validate()?;
        self.pose_buffer.validate()?;
        self.baseframe.validate()?;
        self.reprojection.validate()?;
        self.correction.validate()
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

/// Affine map from localization nanoseconds to estimator nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    pub offset_ns: i64,
    pub scale: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            offset_ns: 0,
            scale: 1.0,
        }
    }
}

impl ClockConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("clock.scale", self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoseBufferConfig {
    /// How much history is kept behind the newest pose.
    pub retention_s: f64,
    /// Maximum distance to the nearest stored pose for an interpolated lookup.
    pub max_propagation_s: f64,
}

impl Default for PoseBufferConfig {
    fn default() -> Self {
        Self {
            retention_s: 20.0,
            max_propagation_s: 0.5,
        }
    }
}

impl PoseBufferConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        duration("pose_buffer.retention_s", self.retention_s)?;
        duration("pose_buffer.max_propagation_s", self.max_propagation_s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseframeConfig {
    /// Number of T_G_M estimates to collect before the first fit. Also the candidate buffer size.
    pub min_num_estimates: usize,
    pub inlier_ratio: f64,
    pub max_ransac_iterations: usize,
    pub rotation_threshold_deg: f64,
    pub translation_threshold_m: f64,
    /// Fixed RANSAC seed; drawn from OS entropy when unset.
    pub seed: Option<u64>,
    pub init_position_covariance_m2: f64,
    pub init_rotation_covariance_rad2: f64,
}

impl Default for BaseframeConfig {
    fn default() -> Self {
        Self {
            min_num_estimates: 2,
            inlier_ratio: 0.6,
            max_ransac_iterations: 200,
            rotation_threshold_deg: 5.0,
            translation_threshold_m: 0.3,
            seed: None,
            init_position_covariance_m2: 20.0,
            init_rotation_covariance_rad2: 90f64.to_radians(),
        }
    }
}

impl BaseframeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_num_estimates < 1 {
            return Err(ConfigError::TooSmall {
                field: "baseframe.min_num_estimates",
                value: self.min_num_estimates,
                min: 1,
            });
        }
        if self.max_ransac_iterations < 1 {
            return Err(ConfigError::TooSmall {
                field: "baseframe.max_ransac_iterations",
                value: self.max_ransac_iterations,
                min: 1,
            });
        }
        ratio("baseframe.inlier_ratio", self.inlier_ratio)?;
        positive("baseframe.rotation_threshold_deg", self.rotation_threshold_deg)?;
        positive("baseframe.translation_threshold_m", self.translation_threshold_m)?;
        positive(
            "baseframe.init_position_covariance_m2",
            self.init_position_covariance_m2,
        )?;
        positive(
            "baseframe.init_rotation_covariance_rad2",
            self.init_rotation_covariance_rad2,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReprojectionConfig {
    /// Largest tolerated |mean filter error - mean localization error|.
    pub max_mean_error_px: f64,
    /// The number of reprojected matches must exceed this.
    pub min_structure_constraints: usize,
    /// The fraction of reprojected matches must exceed this.
    pub min_success_rate: f64,
}

impl Default for ReprojectionConfig {
    fn default() -> Self {
        Self {
            max_mean_error_px: 100.0,
            min_structure_constraints: 5,
            min_success_rate: 0.5,
        }
    }
}

impl ReprojectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("reprojection.max_mean_error_px", self.max_mean_error_px)?;
        ratio("reprojection.min_success_rate", self.min_success_rate)
    }
}

/// Fixed standard deviations used for every direct-pose correction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrectionCovarianceConfig {
    /// About 2 degrees.
    pub orientation_std_rad: f64,
    pub position_std_m: f64,
}

impl Default for CorrectionCovarianceConfig {
    fn default() -> Self {
        Self {
            orientation_std_rad: 0.04,
            position_std_m: 0.8,
        }
    }
}

impl CorrectionCovarianceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("correction.orientation_std_rad", self.orientation_std_rad)?;
        positive("correction.position_std_m", self.position_std_m)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// Durations are held in nanoseconds, so they must still be positive once rounded.
fn duration(field: &'static str, seconds: f64) -> Result<(), ConfigError> {
    positive(field, seconds)?;
    if seconds_to_nanos(seconds) < 1 {
        return Err(ConfigError::NotPositive { field, value: seconds });
    }
    Ok(())
}

fn ratio(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::NotARatio { field, value })
    }
}
