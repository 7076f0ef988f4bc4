// locus_core/src/estimation/recording.rs

use parking_lot::Mutex;

use super::StateEstimator;
use crate::baseframe::Baseframe;
use crate::messages::{CorrespondenceUpdate, EstimatorStatus, PoseUpdate};

/// An estimator stand-in that records every update it is handed.
///
/// Used by the simulator and by tests to observe what the fusion core emits.
#[derive(Debug, Default)]
pub struct RecordingEstimator {
    accepts_correspondences: bool,
    status: Mutex<EstimatorStatus>,
    pose_updates: Mutex<Vec<PoseUpdate>>,
    correspondence_updates: Mutex<Vec<CorrespondenceUpdate>>,
    baseframe_resets: Mutex<Vec<Baseframe>>,
}

impl RecordingEstimator {
    /// Records pose updates and declines structure constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records both kinds of update and reports correspondence updates as applied.
    pub fn with_structure_support() -> Self {
        Self {
            accepts_correspondences: true,
            ..Self::default()
        }
    }

    pub fn set_status(&self, status: EstimatorStatus) {
        *self.status.lock() = status;
    }

    pub fn pose_updates(&self) -> Vec<PoseUpdate> {
        self.pose_updates.lock().clone()
    }

    pub fn correspondence_updates(&self) -> Vec<CorrespondenceUpdate> {
        self.correspondence_updates.lock().clone()
    }

    pub fn baseframe_resets(&self) -> Vec<Baseframe> {
        self.baseframe_resets.lock().clone()
    }

    pub fn num_updates(&self) -> usize {
        self.pose_updates.lock().len() + self.correspondence_updates.lock().len()
    }
}

impl StateEstimator for RecordingEstimator {
    fn ingest_pose_update(&self, update: &PoseUpdate) {
        self.pose_updates.lock().push(update.clone());
    }

    fn ingest_correspondence_update(&self, update: &CorrespondenceUpdate) -> bool {
        if self.accepts_correspondences {
            self.correspondence_updates.lock().push(update.clone());
        }
        self.accepts_correspondences
    }

    fn reset_baseframe(&self, baseframe: &Baseframe) {
        self.baseframe_resets.lock().push(baseframe.clone());
    }

    fn query_status(&self) -> EstimatorStatus {
        *self.status.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix6, UnitQuaternion, Vector3};

    fn correspondence_update() -> CorrespondenceUpdate {
        CorrespondenceUpdate {
            sensor: 0,
            keypoints: Vec::new(),
            landmarks_g: Vec::new(),
            timestamp_s: 1.0,
        }
    }

    #[test]
    fn default_estimator_declines_structure_constraints() {
        let estimator = RecordingEstimator::new();
        assert!(!estimator.ingest_correspondence_update(&correspondence_update()));
        assert!(estimator.correspondence_updates().is_empty());

        let structured = RecordingEstimator::with_structure_support();
        assert!(structured.ingest_correspondence_update(&correspondence_update()));
        assert_eq!(structured.correspondence_updates().len(), 1);
    }

    #[test]
    fn records_pose_updates_and_status() {
        let estimator = RecordingEstimator::new();
        estimator.ingest_pose_update(&PoseUpdate {
            timestamp_s: 2.5,
            position: Vector3::new(1.0, 2.0, 3.0),
            orientation: UnitQuaternion::identity(),
            covariance: Matrix6::identity(),
        });
        assert_eq!(estimator.pose_updates()[0].timestamp_s, 2.5);
        assert_eq!(estimator.num_updates(), 1);

        assert!(!estimator.query_status().initialized);
        estimator.set_status(EstimatorStatus {
            initialized: true,
            ..Default::default()
        });
        assert!(estimator.query_status().initialized);
    }
}
