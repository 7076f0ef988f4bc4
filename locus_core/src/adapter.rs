// locus_core/src/adapter.rs

use nalgebra::{Matrix3, Matrix6};

use crate::config::CorrectionCovarianceConfig;
use crate::estimation::StateEstimator;
use crate::messages::{CorrespondenceUpdate, LocalizationObservation, PoseUpdate};
use crate::reprojection::ActiveSensorMap;
use crate::types::Pose;

/// Packages accepted localizations into the estimator's ingestion format.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementAdapter {
    pose_covariance: Matrix6<f64>,
}

impl MeasurementAdapter {
    pub fn new(config: &CorrectionCovarianceConfig) -> Self {
        Self {
            pose_covariance: direct_pose_covariance(config),
        }
    }

    pub fn pose_covariance(&self) -> &Matrix6<f64> {
        &self.pose_covariance
    }

    /// The covariance is fixed; nothing about the observation's own quality goes into it.
    pub fn pose_update(&self, t_g_b: &Pose, timestamp_s: f64) -> PoseUpdate {
        PoseUpdate {
            timestamp_s,
            position: t_g_b.translation.vector,
            orientation: t_g_b.rotation,
            covariance: self.pose_covariance,
        }
    }

    /// One update per active sensor with matches, re-indexed to the estimator's numbering.
    pub fn correspondence_updates(
        &self,
        observation: &LocalizationObservation,
        active_sensors: &ActiveSensorMap,
        timestamp_s: f64,
    ) -> Vec<CorrespondenceUpdate> {
        observation
            .correspondences
            .iter()
            .filter(|sensor| !sensor.is_empty())
            .filter_map(|sensor| {
                let estimator_sensor = active_sensors.estimator_sensor(sensor.sensor)?;
                Some(CorrespondenceUpdate {
                    sensor: estimator_sensor,
                    keypoints: sensor.keypoints(),
                    landmarks_g: sensor.landmarks(),
                    timestamp_s,
                })
            })
            .collect()
    }

    /// Hands a direct pose correction to the estimator. Always reported as accepted.
    pub fn apply_pose(&self, estimator: &dyn StateEstimator, t_g_b: &Pose, timestamp_s: f64) -> bool {
        estimator.ingest_pose_update(&self.pose_update(t_g_b, timestamp_s));
        true
    }

    /// Hands every active sensor's matches to the estimator.
    /// Accepted only if every per-sensor update was; all are attempted regardless.
    pub fn apply_correspondences(
        &self,
        estimator: &dyn StateEstimator,
        observation: &LocalizationObservation,
        active_sensors: &ActiveSensorMap,
        timestamp_s: f64,
    ) -> bool {
        self.correspondence_updates(observation, active_sensors, timestamp_s)
            .iter()
            .fold(true, |accepted, update| {
                estimator.ingest_correspondence_update(update) & accepted
            })
    }
}

/// Orientation variance on the first 3x3 block, position variance on the second.
pub fn direct_pose_covariance(config: &CorrectionCovarianceConfig) -> Matrix6<f64> {
    let mut covariance = Matrix6::zeros();
    covariance
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&(Matrix3::identity() * config.orientation_std_rad.powi(2)));
    covariance
        .fixed_view_mut::<3, 3>(3, 3)
        .copy_from(&(Matrix3::identity() * config.position_std_m.powi(2)));
    covariance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::RecordingEstimator;
    use crate::messages::{Correspondence, SensorCorrespondences};
    use approx::assert_abs_diff_eq;
    use nalgebra::{Point2, Point3, Vector3};

    fn observation() -> LocalizationObservation {
        let matches = |n: usize| {
            (0..n)
                .map(|i| Correspondence {
                    keypoint: Point2::new(i as f64, 0.0),
                    landmark_g: Point3::new(0.0, i as f64, 5.0),
                })
                .collect()
        };
        LocalizationObservation::from_pose(0, Pose::identity()).with_correspondences(vec![
            SensorCorrespondences::new(0, matches(3)),
            SensorCorrespondences::new(1, matches(4)),
            SensorCorrespondences::new(2, Vec::new()),
        ])
    }

    #[test]
    fn covariance_has_fixed_diagonal_blocks() {
        let covariance = direct_pose_covariance(&CorrectionCovarianceConfig::default());
        for i in 0..3 {
            assert_abs_diff_eq!(covariance[(i, i)], 0.0016, epsilon = 1e-12);
            assert_abs_diff_eq!(covariance[(i + 3, i + 3)], 0.64, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(covariance.sum(), 3.0 * (0.0016 + 0.64), epsilon = 1e-12);
    }

    #[test]
    fn pose_update_carries_observation_pose_and_time() {
        let adapter = MeasurementAdapter::new(&CorrectionCovarianceConfig::default());
        let t_g_b = Pose::new(Vector3::new(4.0, 5.0, 6.0), Vector3::z() * 0.5);

        let update = adapter.pose_update(&t_g_b, 12.25);
        assert_eq!(update.timestamp_s, 12.25);
        assert_eq!(update.position, Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(update.orientation, t_g_b.rotation);
        assert_eq!(&update.covariance, adapter.pose_covariance());
    }

    #[test]
    fn correspondence_updates_are_reindexed_and_filtered() {
        let adapter = MeasurementAdapter::new(&CorrectionCovarianceConfig::default());
        let active = ActiveSensorMap::new([(1, 0), (2, 1)]).unwrap();

        let updates = adapter.correspondence_updates(&observation(), &active, 3.0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].sensor, 0);
        assert_eq!(updates[0].keypoints.len(), 4);
        assert_eq!(updates[0].landmarks_g.len(), 4);
    }

    #[test]
    fn batch_acceptance_is_conjunction() {
        let adapter = MeasurementAdapter::new(&CorrectionCovarianceConfig::default());
        let active = ActiveSensorMap::new([(0, 0), (1, 1)]).unwrap();

        let declining = RecordingEstimator::new();
        assert!(!adapter.apply_correspondences(&declining, &observation(), &active, 1.0));

        let accepting = RecordingEstimator::with_structure_support();
        assert!(adapter.apply_correspondences(&accepting, &observation(), &active, 1.0));
        assert_eq!(accepting.correspondence_updates().len(), 2);
    }
}
