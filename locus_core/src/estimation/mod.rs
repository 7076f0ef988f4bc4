// locus_core/src/estimation/mod.rs

use crate::baseframe::Baseframe;
use crate::messages::{CorrespondenceUpdate, EstimatorStatus, PoseUpdate};

/// The contract for the external motion estimator that localization corrections are fed into.
/// Calls may arrive from the localization thread while the estimator's own
/// output thread is running, so implementations take `&self`.
pub trait StateEstimator: Send + Sync {
    /// A direct 6-DoF correction. The estimator may silently drop stale updates.
    fn ingest_pose_update(&self, update: &PoseUpdate);

    /// A structure-constraint correction for one camera. Returns whether it was applied.
    ///
    /// Estimators without structure-constraint support keep this default.
    fn ingest_correspondence_update(&self, _update: &CorrespondenceUpdate) -> bool {
        false
    }

    /// Re-anchors the estimator's local frame at a freshly fitted `T_G_M`, with
    /// the prior covariance carried by the baseframe. Estimators that keep their
    /// own frame ignore it.
    fn reset_baseframe(&self, _baseframe: &Baseframe) {}

    /// Diagnostics only; never used to decide whether a correction is applied.
    fn query_status(&self) -> EstimatorStatus;
}

pub mod recording;

pub use recording::RecordingEstimator;
