use crate::types::{Pose, SensorIndex, Timestamp};
use nalgebra::{Matrix6, Point2, Point3, UnitQuaternion, Vector3};

// =========================================================================
// == Localization Input ==
// =========================================================================

/// A single 2D-3D match produced by the place-recognition pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// The observed keypoint in pixel coordinates.
    pub keypoint: Point2<f64>,
    /// The matched map landmark, expressed in the global frame.
    pub landmark_g: Point3<f64>,
}

/// All matches found in the image of one localization-side sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorCorrespondences {
    /// Sensor index as numbered by the localization pipeline.
    pub sensor: SensorIndex,
    pub matches: Vec<Correspondence>,
}

impl SensorCorrespondences {
    pub fn new(sensor: SensorIndex, matches: Vec<Correspondence>) -> Self {
        Self { sensor, matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn keypoints(&self) -> Vec<Point2<f64>> {
        self.matches.iter().map(|m| m.keypoint).collect()
    }

    pub fn landmarks(&self) -> Vec<Point3<f64>> {
        self.matches.iter().map(|m| m.landmark_g).collect()
    }
}

/// A globally referenced localization of the body, as delivered by the mapping side.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizationObservation {
    /// Localization clock.
    pub timestamp_ns: Timestamp,
    /// Body pose in the global frame.
    pub t_g_b: Pose,
    /// Empty when the producer only reports a pose.
    pub correspondences: Vec<SensorCorrespondences>,
}

impl LocalizationObservation {
    pub fn from_pose(timestamp_ns: Timestamp, t_g_b: Pose) -> Self {
        Self {
            timestamp_ns,
            t_g_b,
            correspondences: Vec::new(),
        }
    }

    pub fn with_correspondences(mut self, correspondences: Vec<SensorCorrespondences>) -> Self {
        self.correspondences = correspondences;
        self
    }

    pub fn num_matches(&self) -> usize {
        self.correspondences.iter().map(SensorCorrespondences::len).sum()
    }
}

// =========================================================================
// == Estimator Ingestion Messages ==
// =========================================================================

/// A direct 6-DoF correction. Covariance rows/cols 0..3 are orientation, 3..6 position.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseUpdate {
    /// Estimator clock, seconds.
    pub timestamp_s: f64,
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub covariance: Matrix6<f64>,
}

/// A structure-constraint correction for one estimator-side camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceUpdate {
    /// Sensor index as numbered by the estimator.
    pub sensor: SensorIndex,
    pub keypoints: Vec<Point2<f64>>,
    pub landmarks_g: Vec<Point3<f64>>,
    /// Estimator clock, seconds.
    pub timestamp_s: f64,
}

/// What the estimator reports about itself. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EstimatorStatus {
    pub initialized: bool,
    pub localized: bool,
    /// The estimator's own local-to-global transform, when it has one.
    pub t_g_m: Option<Pose>,
}
