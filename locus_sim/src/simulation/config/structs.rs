// locus_sim/src/simulation/config/structs.rs

use serde::Deserialize;

use locus_core::config::LocalizationConfig;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a `scenario.toml` file: how the synthetic
/// world behaves, plus the fusion core's own configuration under `[localization]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    #[serde(default)]
    pub trajectory: Trajectory,

    #[serde(default)]
    pub drift: Drift,

    #[serde(default)]
    pub localizer: Localizer,

    #[serde(default)]
    pub camera: Camera,

    #[serde(default)]
    pub localization: LocalizationConfig,
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Simulation {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    pub duration_s: f64,
    /// Rate of the estimator's `T_M_I` output.
    pub pose_rate_hz: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: None,
            duration_s: 30.0,
            pose_rate_hz: 20.0,
        }
    }
}

/// Ground-truth body motion: a level circle driven at constant speed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Trajectory {
    pub radius_m: f64,
    pub angular_speed_rad_s: f64,
    pub height_m: f64,
}

impl Default for Trajectory {
    fn default() -> Self {
        Self {
            radius_m: 15.0,
            angular_speed_rad_s: 0.1,
            height_m: 1.2,
        }
    }
}

/// Where the estimator's local frame sits in the global map, and how fast it wanders.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Drift {
    pub initial_offset_m: [f64; 3],
    pub initial_yaw_deg: f64,
    pub offset_rate_m_s: [f64; 3],
    pub yaw_rate_deg_s: f64,
}

impl Default for Drift {
    fn default() -> Self {
        Self {
            initial_offset_m: [25.0, -10.0, 0.0],
            initial_yaw_deg: 40.0,
            offset_rate_m_s: [0.0; 3],
            yaw_rate_deg_s: 0.0,
        }
    }
}

/// The synthetic place-recognition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Localizer {
    pub rate_hz: f64,
    /// How far behind the estimator the localization timestamps lag.
    pub latency_s: f64,
    pub position_noise_m: f64,
    pub yaw_noise_deg: f64,
    pub tilt_noise_deg: f64,
    pub keypoint_noise_px: f64,
    /// Chance that a localization reports a wildly wrong pose.
    pub outlier_probability: f64,
    pub outlier_offset_m: f64,
    pub landmarks_per_frame: usize,
    /// Range of landmark distances in front of the camera.
    pub landmark_depth_m: [f64; 2],
    /// Half-width of the lateral/vertical band landmarks are drawn from.
    pub landmark_spread_m: f64,
    /// Localization-side index of the camera that produces the matches.
    pub sensor: usize,
}

impl Default for Localizer {
    fn default() -> Self {
        Self {
            rate_hz: 1.0,
            latency_s: 0.2,
            position_noise_m: 0.05,
            yaw_noise_deg: 0.5,
            tilt_noise_deg: 0.2,
            keypoint_noise_px: 1.0,
            outlier_probability: 0.1,
            outlier_offset_m: 5.0,
            landmarks_per_frame: 40,
            landmark_depth_m: [4.0, 12.0],
            landmark_spread_m: 1.5,
            sensor: 0,
        }
    }
}

/// A forward-looking pinhole camera on the body.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Camera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
    /// Camera position on the body.
    pub mount_offset_m: [f64; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fx: 400.0,
            fy: 400.0,
            cx: 320.0,
            cy: 240.0,
            width: 640,
            height: 480,
            mount_offset_m: [0.2, 0.0, 0.3],
        }
    }
}
