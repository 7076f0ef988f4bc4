// locus_core/src/handler.rs

//! The localization fusion entry point.
//!
//! Two streams feed a [`LocalizationHandler`]: the estimator's own pose output
//! ([`LocalizationHandler::process_pose_sample`]) and globally referenced
//! localizations from the mapping side
//! ([`LocalizationHandler::process_localization_result`]). Either may be called
//! from its own thread.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::adapter::MeasurementAdapter;
use crate::baseframe::{Baseframe, BaseframeEstimator, BaseframeSource, SharedBaseframe};
use crate::clock::{ClockAligner, TimeTranslation};
use crate::config::{LocalizationConfig, LocalizationMode};
use crate::error::{ConfigError, LocalizationError, QualityRejection};
use crate::estimation::StateEstimator;
use crate::messages::{EstimatorStatus, LocalizationObservation};
use crate::models::camera::CameraRig;
use crate::pose_buffer::{PoseLookup, PoseLookupBuffer};
use crate::reprojection::{ActiveSensorMap, GateReport, ReprojectionGate};
use crate::state::{LocalizationState, Route};
use crate::transforms::gravity_disparity_deg;
use crate::types::{Pose, PoseSample, Timestamp};

/// Observations waiting for estimator poses. The oldest is dropped beyond this.
const MAX_PENDING_LOCALIZATIONS: usize = 64;

/// How an accepted correction reached the estimator.
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    DirectPose,
    /// Only inactive sensors had matches; the pose was applied directly instead.
    InactiveSensorPose,
    Structure(GateReport),
}

/// The status-coded result of handing one observation to the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalizationOutcome {
    /// A new baseframe was adopted and the handler is now localized.
    Initialized(Arc<Baseframe>),
    Corrected(Correction),
    /// Queued until the estimator catches up to its timestamp.
    Deferred,
    Rejected(LocalizationError),
}

impl LocalizationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            LocalizationOutcome::Initialized(_) | LocalizationOutcome::Corrected(_)
        )
    }
}

pub struct LocalizationHandler {
    config: LocalizationConfig,
    clock: Box<dyn TimeTranslation>,
    poses: PoseLookupBuffer,
    baseframe_estimator: BaseframeEstimator,
    baseframe: SharedBaseframe,
    state: Mutex<LocalizationState>,
    /// Present only in structure-correspondence mode.
    gate: Option<ReprojectionGate>,
    adapter: MeasurementAdapter,
    estimator: Arc<dyn StateEstimator>,
    pending: Mutex<VecDeque<LocalizationObservation>>,
}

impl LocalizationHandler {
    /// `cameras` is only consulted in structure-correspondence mode and may be empty otherwise.
    pub fn new(
        config: LocalizationConfig,
        cameras: CameraRig,
        estimator: Arc<dyn StateEstimator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = ClockAligner::from_config(&config.clock)?;

        let gate = match config.mode {
            LocalizationMode::DirectPose => {
                info!("Localization mode: 6-DoF pose constraints.");
                None
            }
            LocalizationMode::StructureCorrespondence => {
                info!("Localization mode: structure constraints.");
                let active_sensors = ActiveSensorMap::from_pairs(&config.active_sensors)?;
                Some(ReprojectionGate::new(config.reprojection, cameras, active_sensors)?)
            }
        };

        let state = LocalizationState::initial(config.skips_initialization());
        debug!("Localization handler starts {}.", state);

        Ok(Self {
            clock: Box::new(clock),
            poses: PoseLookupBuffer::from_config(&config.pose_buffer),
            baseframe_estimator: BaseframeEstimator::new(config.baseframe),
            baseframe: SharedBaseframe::new(),
            state: Mutex::new(state),
            gate,
            adapter: MeasurementAdapter::new(&config.correction),
            estimator,
            pending: Mutex::new(VecDeque::new()),
            config,
        })
    }

    /// Replaces the configured affine clock mapping.
    pub fn with_time_translation(mut self, clock: Box<dyn TimeTranslation>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LocalizationConfig {
        &self.config
    }

    pub fn state(&self) -> LocalizationState {
        *self.state.lock()
    }

    pub fn baseframe(&self) -> Option<Arc<Baseframe>> {
        self.baseframe.load()
    }

    pub fn pose_buffer(&self) -> &PoseLookupBuffer {
        &self.poses
    }

    pub fn num_pending(&self) -> usize {
        self.pending.lock().len()
    }

    // =========================================================================
    // == Input Streams ==
    // =========================================================================

    /// Stores one `T_M_I` estimate, stamped in the estimator clock.
    /// Returns the outcomes of any queued observations that became processable.
    pub fn process_pose_sample(&self, sample: PoseSample) -> Vec<LocalizationOutcome> {
        self.poses.insert(sample);
        if self.config.buffer_pending_localizations {
            self.replay_pending()
        } else {
            Vec::new()
        }
    }

    /// Adopts the estimator's own `T_G_M` when it reports itself localized.
    pub fn process_estimator_status(&self, status: &EstimatorStatus) -> Option<Arc<Baseframe>> {
        let t_g_m = status.t_g_m.filter(|_| status.localized)?;
        Some(self.baseframe.publish(Baseframe::new(
            &t_g_m,
            BaseframeSource::Estimator,
            &self.config.baseframe,
        )))
    }

    pub fn process_localization_result(&self, observation: LocalizationObservation) -> LocalizationOutcome {
        if self.config.buffer_pending_localizations {
            if self.is_beyond_pose_horizon(observation.timestamp_ns) {
                return self.discard(&observation);
            }
            let mut pending = self.pending.lock();
            if !pending.is_empty() || !self.is_pose_available(observation.timestamp_ns) {
                if pending.len() == MAX_PENDING_LOCALIZATIONS {
                    if let Some(dropped) = pending.pop_front() {
                        warn!(
                            "Pending localization queue is full, dropping the one at t = {}ns.",
                            dropped.timestamp_ns
                        );
                    }
                }
                pending.push_back(observation);
                return LocalizationOutcome::Deferred;
            }
        }
        self.process_internal(&observation)
    }

    fn is_pose_available(&self, timestamp_ns: Timestamp) -> bool {
        let local_ns = self.clock.to_local_clock(timestamp_ns);
        self.poses
            .newest_available_timestamp()
            .is_some_and(|newest| local_ns <= newest)
    }

    /// More than a retention window ahead of the newest pose. Such a timestamp
    /// would hold up every observation queued behind it.
    fn is_beyond_pose_horizon(&self, timestamp_ns: Timestamp) -> bool {
        let local_ns = self.clock.to_local_clock(timestamp_ns);
        self.poses
            .newest_available_timestamp()
            .is_some_and(|newest| local_ns.saturating_sub(newest) > self.poses.retention_ns())
    }

    fn discard(&self, observation: &LocalizationObservation) -> LocalizationOutcome {
        warn!(
            "Discarding localization at t = {}ns, it is too far ahead of the estimator.",
            observation.timestamp_ns
        );
        LocalizationOutcome::Rejected(LocalizationError::BeyondPoseHorizon {
            timestamp_ns: observation.timestamp_ns,
        })
    }

    fn replay_pending(&self) -> Vec<LocalizationOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let next = {
                let mut pending = self.pending.lock();
                match pending.front() {
                    Some(front) if self.is_beyond_pose_horizon(front.timestamp_ns) => {
                        pending.pop_front().map(|observation| (observation, false))
                    }
                    Some(front) if self.is_pose_available(front.timestamp_ns) => {
                        pending.pop_front().map(|observation| (observation, true))
                    }
                    _ => None,
                }
            };
            let Some((observation, processable)) = next else {
                return outcomes;
            };
            outcomes.push(if processable {
                self.process_internal(&observation)
            } else {
                self.discard(&observation)
            });
        }
    }

    // =========================================================================
    // == Routing ==
    // =========================================================================

    fn process_internal(&self, observation: &LocalizationObservation) -> LocalizationOutcome {
        let route = self.state.lock().route();
        let result = match route {
            Route::Initialize => self.initialize_baseframe(observation).map(LocalizationOutcome::Initialized),
            Route::Correct => self.process_as_update(observation).map(LocalizationOutcome::Corrected),
        };
        result.unwrap_or_else(LocalizationOutcome::Rejected)
    }

    fn pose_at(&self, timestamp_ns: Timestamp) -> Result<Pose, LocalizationError> {
        match self.poses.lookup(timestamp_ns) {
            PoseLookup::Available(pose) => Ok(pose),
            PoseLookup::NotYetAvailable => Err(LocalizationError::PoseNotYetAvailable { timestamp_ns }),
            PoseLookup::NeverAvailable => Err(LocalizationError::PoseNeverAvailable { timestamp_ns }),
        }
    }

    fn initialize_baseframe(&self, observation: &LocalizationObservation) -> Result<Arc<Baseframe>, LocalizationError> {
        let local_ns = self.clock.to_local_clock(observation.timestamp_ns);
        let t_m_i = self.pose_at(local_ns).inspect_err(|_| {
            warn!("Could not get T_M_I for baseframe initialization.");
        })?;

        let baseframe = self.baseframe_estimator.add_estimate(&observation.t_g_b, &t_m_i)?;
        let snapshot = self.baseframe.publish(baseframe);
        self.estimator.reset_baseframe(&snapshot);

        let mut state = self.state.lock();
        *state = state.on_baseframe_adopted();
        info!("(Re-)initialized the localization baseframe.");
        Ok(snapshot)
    }

    // =========================================================================
    // == Correction ==
    // =========================================================================

    /// Filter estimate of the body pose in the global frame at `local_ns`.
    fn filter_pose(&self, local_ns: Timestamp) -> Result<Pose, LocalizationError> {
        let t_m_i = self.pose_at(local_ns).inspect_err(|_| {
            warn!("Could not get T_M_I for the localization update.");
        })?;
        let baseframe = self.baseframe.load().ok_or(LocalizationError::NoBaseframe)?;
        Ok(baseframe.t_g_m() * t_m_i)
    }

    fn check_gravity(&self, t_g_b: &Pose, t_g_i_filter: &Pose) -> Result<(), QualityRejection> {
        let Some(threshold_deg) = self.config.max_gravity_misalignment_deg else {
            return Ok(());
        };
        let angle_deg = gravity_disparity_deg(t_g_i_filter, t_g_b);
        if angle_deg > threshold_deg {
            warn!(
                "The gravity direction of the localization disagrees with the estimator by {:.2}deg (threshold: {:.2}deg).",
                angle_deg, threshold_deg
            );
            return Err(QualityRejection::GravityMisaligned {
                angle_deg,
                threshold_deg,
            });
        }
        Ok(())
    }

    fn process_as_update(&self, observation: &LocalizationObservation) -> Result<Correction, LocalizationError> {
        let local_ns = self.clock.to_local_clock(observation.timestamp_ns);
        let timestamp_s = self.clock.to_local_seconds(observation.timestamp_ns);

        let Some(gate) = &self.gate else {
            if self.config.max_gravity_misalignment_deg.is_some() {
                let t_g_i_filter = self.filter_pose(local_ns)?;
                self.check_gravity(&observation.t_g_b, &t_g_i_filter)
                    .map_err(|rejection| self.reject(rejection))?;
            }
            self.adapter
                .apply_pose(self.estimator.as_ref(), &observation.t_g_b, timestamp_s);
            return Ok(Correction::DirectPose);
        };

        let coverage = gate.active_sensors().coverage(observation);
        if coverage.active_matches == 0 {
            if self.config.use_direct_pose_for_inactive_sensors {
                self.adapter
                    .apply_pose(self.estimator.as_ref(), &observation.t_g_b, timestamp_s);
                debug!(
                    "No localization found for an active camera, applied the pose from {} inactive-camera matches.",
                    coverage.inactive_matches
                );
                return Ok(Correction::InactiveSensorPose);
            }
            return Err(LocalizationError::QualityRejected(QualityRejection::NoActiveMatches));
        }

        let t_g_i_filter = self.filter_pose(local_ns)?;
        self.check_gravity(&observation.t_g_b, &t_g_i_filter)
            .map_err(|rejection| self.reject(rejection))?;

        let report = gate
            .evaluate(observation, &t_g_i_filter)
            .map_err(|rejection| {
                warn!("{}. Will reset the localization.", rejection);
                self.reject(rejection)
            })?;
        debug!("Localization reprojection error [px]: {:.3}", report.difference_px);

        let accepted = self.adapter.apply_correspondences(
            self.estimator.as_ref(),
            observation,
            gate.active_sensors(),
            timestamp_s,
        );
        if !accepted {
            if self.estimator.query_status().initialized {
                warn!(
                    "Estimator rejected localization update at time = {}ns. The latency was too large; consider reducing the localization rate.",
                    observation.timestamp_ns
                );
            }
            return Err(LocalizationError::EstimatorRejected {
                timestamp_ns: observation.timestamp_ns,
            });
        }
        Ok(Correction::Structure(report))
    }

    /// Applies the demotion policy for a failed quality check.
    fn reject(&self, rejection: QualityRejection) -> LocalizationError {
        if !self.config.skips_initialization() {
            let mut state = self.state.lock();
            let demoted = state.on_quality_rejected(self.config.demote_on_quality_rejection);
            if demoted != *state {
                self.baseframe_estimator.reset();
                info!("Localization state: {} -> {}.", *state, demoted);
            }
            *state = demoted;
        }
        LocalizationError::QualityRejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReprojectionConfig;
    use crate::estimation::RecordingEstimator;
    use crate::reprojection::tests::{forward_camera, observe};
    use crate::transforms::{rotation_error, translation_error};
    use crate::types::seconds_to_nanos;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    fn t_g_m() -> Pose {
        Pose::new(Vector3::new(10.0, -5.0, 0.2), Vector3::z() * 0.7)
    }

    fn t_m_i(t_s: f64) -> Pose {
        Pose::new(Vector3::new(t_s, 0.2 * t_s, 0.0), Vector3::z() * 0.05 * t_s)
    }

    fn t_g_b(t_s: f64) -> Pose {
        t_g_m() * t_m_i(t_s)
    }

    /// Estimator poses every 100ms over [0, until_s].
    fn feed_poses(handler: &LocalizationHandler, until_s: f64) {
        let steps = (until_s * 10.0).round() as i64;
        for i in 0..=steps {
            let t_s = i as f64 * 0.1;
            handler.process_pose_sample(PoseSample::new(seconds_to_nanos(t_s), t_m_i(t_s)));
        }
    }

    fn pose_observation(t_s: f64) -> LocalizationObservation {
        LocalizationObservation::from_pose(seconds_to_nanos(t_s), t_g_b(t_s))
    }

    fn structure_observation(t_s: f64, sensor: usize) -> LocalizationObservation {
        let pose = t_g_b(t_s);
        LocalizationObservation::from_pose(seconds_to_nanos(t_s), pose)
            .with_correspondences(vec![observe(&forward_camera(), &pose, sensor)])
    }

    fn structure_config() -> LocalizationConfig {
        LocalizationConfig {
            mode: LocalizationMode::StructureCorrespondence,
            baseframe: crate::config::BaseframeConfig {
                seed: Some(3),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn handler(config: LocalizationConfig, estimator: Arc<RecordingEstimator>) -> LocalizationHandler {
        let rig = CameraRig::new(vec![forward_camera(), forward_camera()]);
        LocalizationHandler::new(config, rig, estimator).unwrap()
    }

    /// Structure-mode handler that has already adopted a baseframe.
    fn localized_structure_handler(
        config: LocalizationConfig,
        estimator: Arc<RecordingEstimator>,
    ) -> LocalizationHandler {
        let handler = handler(config, estimator);
        feed_poses(&handler, 10.0);
        handler.process_localization_result(pose_observation(1.0));
        assert!(handler.process_localization_result(pose_observation(2.0)).is_accepted());
        handler
    }

    #[test]
    fn handler_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LocalizationHandler>();
    }

    #[test]
    fn direct_pose_mode_corrects_immediately() {
        let estimator = Arc::new(RecordingEstimator::new());
        let handler = handler(LocalizationConfig::default(), estimator.clone());
        assert_eq!(handler.state(), LocalizationState::Localized);

        let outcome = handler.process_localization_result(pose_observation(3.0));
        assert_eq!(outcome, LocalizationOutcome::Corrected(Correction::DirectPose));

        let updates = estimator.pose_updates();
        assert_eq!(updates.len(), 1);
        assert_abs_diff_eq!(updates[0].timestamp_s, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(updates[0].position, t_g_b(3.0).translation.vector, epsilon = 1e-12);
        assert_abs_diff_eq!(updates[0].covariance[(0, 0)], 0.04 * 0.04, epsilon = 1e-12);
        assert_abs_diff_eq!(updates[0].covariance[(5, 5)], 0.8 * 0.8, epsilon = 1e-12);
    }

    #[test]
    fn clock_offset_is_applied_to_pose_updates() {
        let estimator = Arc::new(RecordingEstimator::new());
        let mut config = LocalizationConfig::default();
        config.clock.offset_ns = 2_000_000_000;
        let handler = handler(config, estimator.clone());

        handler.process_localization_result(pose_observation(1.0));
        assert_abs_diff_eq!(estimator.pose_updates()[0].timestamp_s, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn initialization_waits_for_poses_and_estimates() {
        let estimator = Arc::new(RecordingEstimator::new());
        let handler = handler(structure_config(), estimator.clone());
        assert_eq!(handler.state(), LocalizationState::Uninitialized);

        assert_eq!(
            handler.process_localization_result(pose_observation(1.0)),
            LocalizationOutcome::Rejected(LocalizationError::PoseNotYetAvailable {
                timestamp_ns: seconds_to_nanos(1.0)
            })
        );

        feed_poses(&handler, 10.0);
        assert_eq!(
            handler.process_localization_result(pose_observation(1.0)),
            LocalizationOutcome::Rejected(LocalizationError::CollectingEstimates {
                collected: 1,
                required: 2
            })
        );
        assert_eq!(handler.state(), LocalizationState::Uninitialized);

        let LocalizationOutcome::Initialized(baseframe) = handler.process_localization_result(pose_observation(2.05))
        else {
            panic!("expected the baseframe to be initialized");
        };
        assert_eq!(handler.state(), LocalizationState::Localized);
        assert!(translation_error(baseframe.t_g_m(), &t_g_m()) < 1e-3);
        assert!(rotation_error(baseframe.t_g_m(), &t_g_m()) < 1e-3);
        assert_eq!(estimator.num_updates(), 0);

        let resets = estimator.baseframe_resets();
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0], *baseframe);
        assert_abs_diff_eq!(resets[0].position_covariance_m2, 20.0);
        assert_abs_diff_eq!(resets[0].rotation_covariance_rad2, 90f64.to_radians());
    }

    #[test]
    fn evicted_poses_never_seed_the_baseframe() {
        let estimator = Arc::new(RecordingEstimator::new());
        let handler = handler(structure_config(), estimator.clone());
        feed_poses(&handler, 30.0);

        assert_eq!(
            handler.process_localization_result(pose_observation(2.0)),
            LocalizationOutcome::Rejected(LocalizationError::PoseNeverAvailable {
                timestamp_ns: seconds_to_nanos(2.0)
            })
        );
        assert_eq!(handler.state(), LocalizationState::Uninitialized);

        // Nothing was collected for the evicted observation.
        assert_eq!(
            handler.process_localization_result(pose_observation(25.0)),
            LocalizationOutcome::Rejected(LocalizationError::CollectingEstimates {
                collected: 1,
                required: 2
            })
        );
        assert!(estimator.baseframe_resets().is_empty());
    }

    #[test]
    fn durations_that_round_to_zero_are_rejected_at_construction() {
        let mut config = LocalizationConfig::default();
        config.pose_buffer.retention_s = 1e-10;
        let result = LocalizationHandler::new(config, CameraRig::default(), Arc::new(RecordingEstimator::new()));
        assert!(matches!(
            result,
            Err(ConfigError::NotPositive {
                field: "pose_buffer.retention_s",
                ..
            })
        ));
    }

    #[test]
    fn custom_time_translation_replaces_the_configured_clock() {
        struct Lagging(Timestamp);

        impl TimeTranslation for Lagging {
            fn to_local_clock(&self, foreign_ns: Timestamp) -> Timestamp {
                foreign_ns - self.0
            }
        }

        let estimator = Arc::new(RecordingEstimator::new());
        let handler = handler(LocalizationConfig::default(), estimator.clone())
            .with_time_translation(Box::new(Lagging(seconds_to_nanos(0.5))));

        handler.process_localization_result(pose_observation(3.0));
        assert_abs_diff_eq!(estimator.pose_updates()[0].timestamp_s, 2.5, epsilon = 1e-9);
    }

    #[test]
    fn consistent_structure_localization_is_applied() {
        let estimator = Arc::new(RecordingEstimator::with_structure_support());
        let handler = localized_structure_handler(structure_config(), estimator.clone());

        let outcome = handler.process_localization_result(structure_observation(4.0, 0));
        let LocalizationOutcome::Corrected(Correction::Structure(report)) = outcome else {
            panic!("expected a structure correction, got {outcome:?}");
        };
        assert!(report.difference_px < 1.0);

        let updates = estimator.correspondence_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].keypoints.len(), report.attempted);
        assert_abs_diff_eq!(updates[0].timestamp_s, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn estimator_without_structure_support_rejects_the_batch() {
        let estimator = Arc::new(RecordingEstimator::new());
        let handler = localized_structure_handler(structure_config(), estimator);

        assert_eq!(
            handler.process_localization_result(structure_observation(4.0, 0)),
            LocalizationOutcome::Rejected(LocalizationError::EstimatorRejected {
                timestamp_ns: seconds_to_nanos(4.0)
            })
        );
        assert_eq!(handler.state(), LocalizationState::Localized);
    }

    #[test]
    fn quality_rejection_demotes_to_reinitialization() {
        let estimator = Arc::new(RecordingEstimator::with_structure_support());
        let config = LocalizationConfig {
            reprojection: ReprojectionConfig {
                max_mean_error_px: 20.0,
                ..Default::default()
            },
            ..structure_config()
        };
        let handler = localized_structure_handler(config, estimator.clone());

        // The localization claims to be half a metre to the side of the filter.
        let shifted = t_g_b(4.0) * Pose::translation(0.0, 0.5, 0.0);
        let observation = LocalizationObservation::from_pose(seconds_to_nanos(4.0), shifted)
            .with_correspondences(vec![observe(&forward_camera(), &shifted, 0)]);

        let outcome = handler.process_localization_result(observation);
        assert!(matches!(
            outcome,
            LocalizationOutcome::Rejected(LocalizationError::QualityRejected(
                QualityRejection::ReprojectionErrorTooLarge { .. }
            ))
        ));
        assert_eq!(handler.state(), LocalizationState::NotLocalized);
        assert_eq!(handler.state().route(), Route::Initialize);
        assert!(estimator.correspondence_updates().is_empty());
    }

    #[test]
    fn inactive_sensor_matches_fall_back_to_pose_when_enabled() {
        let estimator = Arc::new(RecordingEstimator::with_structure_support());
        let handler = localized_structure_handler(structure_config(), estimator.clone());
        assert_eq!(
            handler.process_localization_result(structure_observation(4.0, 1)),
            LocalizationOutcome::Rejected(LocalizationError::QualityRejected(QualityRejection::NoActiveMatches))
        );
        assert!(estimator.pose_updates().is_empty());

        let estimator = Arc::new(RecordingEstimator::with_structure_support());
        let config = LocalizationConfig {
            use_direct_pose_for_inactive_sensors: true,
            ..structure_config()
        };
        let handler = localized_structure_handler(config, estimator.clone());
        assert_eq!(
            handler.process_localization_result(structure_observation(4.0, 1)),
            LocalizationOutcome::Corrected(Correction::InactiveSensorPose)
        );
        assert_eq!(estimator.pose_updates().len(), 1);
        assert!(estimator.correspondence_updates().is_empty());
    }

    #[test]
    fn pending_localizations_replay_once_poses_arrive() {
        let estimator = Arc::new(RecordingEstimator::new());
        let config = LocalizationConfig {
            buffer_pending_localizations: true,
            ..Default::default()
        };
        let handler = handler(config, estimator.clone());
        feed_poses(&handler, 1.0);

        assert_eq!(handler.process_localization_result(pose_observation(1.5)), LocalizationOutcome::Deferred);
        assert_eq!(handler.process_localization_result(pose_observation(1.7)), LocalizationOutcome::Deferred);
        assert_eq!(handler.num_pending(), 2);
        assert!(estimator.pose_updates().is_empty());

        let replayed = handler.process_pose_sample(PoseSample::new(seconds_to_nanos(1.6), t_m_i(1.6)));
        assert_eq!(replayed, vec![LocalizationOutcome::Corrected(Correction::DirectPose)]);
        assert_eq!(handler.num_pending(), 1);

        let replayed = handler.process_pose_sample(PoseSample::new(seconds_to_nanos(2.0), t_m_i(2.0)));
        assert_eq!(replayed.len(), 1);
        assert_eq!(handler.num_pending(), 0);

        let times: Vec<f64> = estimator.pose_updates().iter().map(|u| u.timestamp_s).collect();
        assert_abs_diff_eq!(times[0], 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(times[1], 1.7, epsilon = 1e-9);
    }

    #[test]
    fn far_future_localizations_do_not_hold_up_the_queue() {
        let estimator = Arc::new(RecordingEstimator::new());
        let config = LocalizationConfig {
            buffer_pending_localizations: true,
            ..Default::default()
        };
        let handler = handler(config, estimator.clone());

        // Before any pose arrives there is no horizon to judge against.
        assert_eq!(handler.process_localization_result(pose_observation(100.0)), LocalizationOutcome::Deferred);
        assert_eq!(handler.process_localization_result(pose_observation(0.5)), LocalizationOutcome::Deferred);

        let replayed = handler.process_pose_sample(PoseSample::new(seconds_to_nanos(1.0), t_m_i(1.0)));
        assert_eq!(
            replayed,
            vec![
                LocalizationOutcome::Rejected(LocalizationError::BeyondPoseHorizon {
                    timestamp_ns: seconds_to_nanos(100.0)
                }),
                LocalizationOutcome::Corrected(Correction::DirectPose),
            ]
        );
        assert_eq!(handler.num_pending(), 0);

        // Once poses exist, a far-future timestamp is turned away on arrival.
        assert_eq!(
            handler.process_localization_result(pose_observation(100.0)),
            LocalizationOutcome::Rejected(LocalizationError::BeyondPoseHorizon {
                timestamp_ns: seconds_to_nanos(100.0)
            })
        );
        assert_eq!(
            handler.process_localization_result(pose_observation(0.8)),
            LocalizationOutcome::Corrected(Correction::DirectPose)
        );
        assert_eq!(estimator.pose_updates().len(), 2);
    }

    #[test]
    fn estimator_status_publishes_canonical_baseframe() {
        let handler = handler(LocalizationConfig::default(), Arc::new(RecordingEstimator::new()));
        assert!(handler
            .process_estimator_status(&EstimatorStatus {
                initialized: true,
                localized: false,
                t_g_m: Some(t_g_m()),
            })
            .is_none());
        assert!(handler.baseframe().is_none());

        let mut flipped = t_g_m();
        flipped.rotation = nalgebra::UnitQuaternion::new_unchecked(-flipped.rotation.into_inner());
        let baseframe = handler
            .process_estimator_status(&EstimatorStatus {
                initialized: true,
                localized: true,
                t_g_m: Some(flipped),
            })
            .unwrap();
        assert_eq!(baseframe.source, BaseframeSource::Estimator);
        assert!(baseframe.t_g_m().rotation.w >= 0.0);
        assert!(rotation_error(baseframe.t_g_m(), &t_g_m()) < 1e-6);
        assert_eq!(handler.baseframe(), Some(baseframe));
    }

    #[test]
    fn gravity_check_rejects_tilted_localizations() {
        let estimator = Arc::new(RecordingEstimator::new());
        let config = LocalizationConfig {
            max_gravity_misalignment_deg: Some(5.0),
            ..Default::default()
        };
        let handler = handler(config, estimator.clone());
        feed_poses(&handler, 5.0);

        assert_eq!(
            handler.process_localization_result(pose_observation(2.0)),
            LocalizationOutcome::Rejected(LocalizationError::NoBaseframe)
        );

        handler.process_estimator_status(&EstimatorStatus {
            initialized: true,
            localized: true,
            t_g_m: Some(t_g_m()),
        });
        assert!(handler.process_localization_result(pose_observation(2.0)).is_accepted());

        let tilted = t_g_b(3.0) * Pose::rotation(Vector3::x() * 0.3);
        let outcome = handler.process_localization_result(LocalizationObservation::from_pose(
            seconds_to_nanos(3.0),
            tilted,
        ));
        assert!(matches!(
            outcome,
            LocalizationOutcome::Rejected(LocalizationError::QualityRejected(
                QualityRejection::GravityMisaligned { .. }
            ))
        ));
        // The estimator anchors itself in this mode, so there is nothing to demote to.
        assert_eq!(handler.state(), LocalizationState::Localized);
        assert_eq!(estimator.pose_updates().len(), 1);
        assert!(estimator.baseframe_resets().is_empty());
    }
}
