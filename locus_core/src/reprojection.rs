// locus_core/src/reprojection.rs

//! Quality gate for correspondence-based localizations.
//!
//! Every matched global landmark is reprojected twice: once from the camera pose
//! implied by the filter (`T_G_M * T_M_I`) and once from the pose the localization
//! itself reported. If the localization is consistent with the filter, both sets
//! of reprojection errors have similar means.

use std::collections::HashMap;

use nalgebra::{Point2, Point3};

use crate::config::ReprojectionConfig;
use crate::error::{ConfigError, QualityRejection};
use crate::messages::LocalizationObservation;
use crate::models::camera::{CameraRig, CameraSensor};
use crate::types::{Pose, SensorIndex};

// =========================================================================
// == Active Sensor Mapping ==
// =========================================================================

/// Which localization-side sensors the estimator actually uses, and under which index.
/// Both directions are built together and never change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSensorMap {
    to_estimator: HashMap<SensorIndex, SensorIndex>,
    to_localization: HashMap<SensorIndex, SensorIndex>,
}

impl ActiveSensorMap {
    /// Builds the map from `(localization_sensor, estimator_sensor)` pairs.
    pub fn new<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (SensorIndex, SensorIndex)>,
    {
        let mut map = Self::default();
        for (localization, estimator) in pairs {
            if map.to_estimator.insert(localization, estimator).is_some() {
                return Err(ConfigError::DuplicateSensorMapping {
                    side: "localization",
                    index: localization,
                });
            }
            if map.to_localization.insert(estimator, localization).is_some() {
                return Err(ConfigError::DuplicateSensorMapping {
                    side: "estimator",
                    index: estimator,
                });
            }
        }
        Ok(map)
    }

    pub fn from_pairs(pairs: &[[SensorIndex; 2]]) -> Result<Self, ConfigError> {
        Self::new(pairs.iter().map(|[l, e]| (*l, *e)))
    }

    pub fn estimator_sensor(&self, localization_sensor: SensorIndex) -> Option<SensorIndex> {
        self.to_estimator.get(&localization_sensor).copied()
    }

    pub fn localization_sensor(&self, estimator_sensor: SensorIndex) -> Option<SensorIndex> {
        self.to_localization.get(&estimator_sensor).copied()
    }

    pub fn is_active(&self, localization_sensor: SensorIndex) -> bool {
        self.to_estimator.contains_key(&localization_sensor)
    }

    pub fn localization_sensors(&self) -> impl Iterator<Item = SensorIndex> + '_ {
        self.to_estimator.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.to_estimator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_estimator.is_empty()
    }

    /// How many matches of an observation fall on active and inactive sensors.
    pub fn coverage(&self, observation: &LocalizationObservation) -> Coverage {
        observation
            .correspondences
            .iter()
            .fold(Coverage::default(), |mut coverage, sensor| {
                if self.is_active(sensor.sensor) {
                    coverage.active_matches += sensor.len();
                } else {
                    coverage.inactive_matches += sensor.len();
                }
                coverage
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coverage {
    pub active_matches: usize,
    pub inactive_matches: usize,
}

// =========================================================================
// == Scoring ==
// =========================================================================

/// Per-match reprojection errors of both poses, for matches where both projections succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReprojectionScores {
    pub filter_errors_px: Vec<f64>,
    pub localization_errors_px: Vec<f64>,
    /// Matches on active sensors that were attempted.
    pub attempted: usize,
}

impl ReprojectionScores {
    pub fn valid(&self) -> usize {
        self.filter_errors_px.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.valid() as f64 / self.attempted as f64
        }
    }
}

/// Accepted verdict with the numbers that led to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateReport {
    pub success_rate: f64,
    pub valid: usize,
    pub attempted: usize,
    pub mean_filter_error_px: f64,
    pub mean_localization_error_px: f64,
    pub difference_px: f64,
}

fn reprojection_error(
    camera: &CameraSensor,
    t_g_c: &Pose,
    landmark_g: &Point3<f64>,
    keypoint: &Point2<f64>,
) -> Option<f64> {
    camera
        .project_global(t_g_c, landmark_g)
        .keypoint()
        .map(|reprojected| (reprojected - keypoint).norm())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// =========================================================================
// == Gate ==
// =========================================================================

#[derive(Debug, Clone)]
pub struct ReprojectionGate {
    config: ReprojectionConfig,
    cameras: CameraRig,
    active_sensors: ActiveSensorMap,
}

impl ReprojectionGate {
    pub fn new(
        config: ReprojectionConfig,
        cameras: CameraRig,
        active_sensors: ActiveSensorMap,
    ) -> Result<Self, ConfigError> {
        cameras.ensure_covers(active_sensors.localization_sensors())?;
        Ok(Self {
            config,
            cameras,
            active_sensors,
        })
    }

    pub fn active_sensors(&self) -> &ActiveSensorMap {
        &self.active_sensors
    }

    pub fn config(&self) -> &ReprojectionConfig {
        &self.config
    }

    /// Reprojects every active-sensor match from both the filter pose and the
    /// localization pose. Matches on inactive sensors are skipped entirely.
    pub fn score(&self, observation: &LocalizationObservation, t_g_i_filter: &Pose) -> ReprojectionScores {
        let mut scores = ReprojectionScores::default();

        for sensor in &observation.correspondences {
            if sensor.is_empty() || !self.active_sensors.is_active(sensor.sensor) {
                continue;
            }
            let Some(camera) = self.cameras.get(sensor.sensor) else {
                continue;
            };

            let t_g_c_filter = camera.t_g_c(t_g_i_filter);
            let t_g_c_localization = camera.t_g_c(&observation.t_g_b);

            for m in &sensor.matches {
                scores.attempted += 1;
                let filter = reprojection_error(camera, &t_g_c_filter, &m.landmark_g, &m.keypoint);
                let localization =
                    reprojection_error(camera, &t_g_c_localization, &m.landmark_g, &m.keypoint);
                if let (Some(filter), Some(localization)) = (filter, localization) {
                    scores.filter_errors_px.push(filter);
                    scores.localization_errors_px.push(localization);
                }
            }
        }

        assert_eq!(
            scores.filter_errors_px.len(),
            scores.localization_errors_px.len(),
            "ReprojectionGate: error lists out of sync"
        );
        scores
    }

    /// Decides whether a correspondence localization is consistent with the filter.
    pub fn evaluate(
        &self,
        observation: &LocalizationObservation,
        t_g_i_filter: &Pose,
    ) -> Result<GateReport, QualityRejection> {
        let scores = self.score(observation, t_g_i_filter);
        if scores.attempted == 0 {
            return Err(QualityRejection::NoActiveMatches);
        }

        let success_rate = scores.success_rate();
        let valid = scores.valid();
        if success_rate <= self.config.min_success_rate || valid <= self.config.min_structure_constraints {
            return Err(QualityRejection::ReprojectionFailed {
                success_rate,
                valid,
                min_valid: self.config.min_structure_constraints,
            });
        }

        let mean_filter_error_px = mean(&scores.filter_errors_px);
        let mean_localization_error_px = mean(&scores.localization_errors_px);
        let difference_px = (mean_filter_error_px - mean_localization_error_px).abs();
        if difference_px > self.config.max_mean_error_px {
            return Err(QualityRejection::ReprojectionErrorTooLarge {
                difference_px,
                threshold_px: self.config.max_mean_error_px,
            });
        }

        Ok(GateReport {
            success_rate,
            valid,
            attempted: scores.attempted,
            mean_filter_error_px,
            mean_localization_error_px,
            difference_px,
        })
    }
}
