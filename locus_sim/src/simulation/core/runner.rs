// locus_sim/src/simulation/core/runner.rs

//! Drives a [`LocalizationHandler`] through a scenario in simulated time.

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;

use tracing::{debug, info};

use locus_core::error::LocalizationError;
use locus_core::estimation::RecordingEstimator;
use locus_core::handler::{LocalizationHandler, LocalizationOutcome};
use locus_core::messages::EstimatorStatus;
use locus_core::state::LocalizationState;
use locus_core::transforms::{rotation_error, translation_error};
use locus_core::types::{seconds_to_nanos, PoseSample, Timestamp};

use super::prng::SimulationRng;
use crate::simulation::config::ScenarioConfig;
use crate::simulation::config::structs::Localizer;
use crate::simulation::sensors::localizer::{camera_rig, SyntheticLocalizer};
use crate::simulation::world::GroundTruth;

/// Tally of what happened to every localization in a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub observations: usize,
    pub initializations: usize,
    pub corrections: usize,
    pub deferred: usize,
    /// Rejections keyed by kind.
    pub rejections: BTreeMap<&'static str, usize>,
    pub pose_updates: usize,
    pub correspondence_updates: usize,
    pub baseframe_resets: usize,
    pub final_state: Option<LocalizationState>,
    /// Baseframe error against the true `T_G_M` at the end of the run.
    pub baseframe_translation_error_m: Option<f64>,
    pub baseframe_rotation_error_deg: Option<f64>,
}

impl RunSummary {
    fn record(&mut self, outcome: &LocalizationOutcome) {
        match outcome {
            LocalizationOutcome::Initialized(_) => self.initializations += 1,
            LocalizationOutcome::Corrected(_) => self.corrections += 1,
            LocalizationOutcome::Deferred => self.deferred += 1,
            LocalizationOutcome::Rejected(error) => {
                *self.rejections.entry(rejection_kind(error)).or_default() += 1;
            }
        }
    }

    pub fn num_rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    pub fn log(&self) {
        info!(
            "Processed {} localizations: {} initializations, {} corrections, {} deferred, {} rejected.",
            self.observations,
            self.initializations,
            self.corrections,
            self.deferred,
            self.num_rejected()
        );
        for (kind, count) in &self.rejections {
            info!("  -> rejected ({}): {}", kind, count);
        }
        info!(
            "Estimator received {} pose updates and {} correspondence updates.",
            self.pose_updates, self.correspondence_updates
        );
        if self.baseframe_resets > 0 {
            info!("Estimator frame was re-anchored {} times.", self.baseframe_resets);
        }
        if let Some(state) = self.final_state {
            info!("Final localization state: {}.", state);
        }
        if let (Some(t), Some(r)) = (self.baseframe_translation_error_m, self.baseframe_rotation_error_deg) {
            info!("Baseframe error: {:.3} m, {:.3} deg.", t, r);
        }
    }
}

fn rejection_kind(error: &LocalizationError) -> &'static str {
    match error {
        LocalizationError::PoseNotYetAvailable { .. } | LocalizationError::PoseNeverAvailable { .. } => {
            "pose unavailable"
        }
        LocalizationError::BeyondPoseHorizon { .. } => "beyond pose horizon",
        LocalizationError::CollectingEstimates { .. } => "collecting estimates",
        LocalizationError::InsufficientConsensus { .. } => "insufficient consensus",
        LocalizationError::NoBaseframe => "no baseframe",
        LocalizationError::QualityRejected(_) => "quality",
        LocalizationError::EstimatorRejected { .. } => "estimator",
    }
}

/// Localizations are stamped in the localization clock, which runs `offset` behind the estimator's.
fn localization_timestamp(config: &ScenarioConfig, estimator_ns: Timestamp) -> Timestamp {
    let clock = &config.localization.clock;
    ((estimator_ns - clock.offset_ns) as f64 / clock.scale).round() as Timestamp
}

pub fn run_scenario(config: &ScenarioConfig) -> Result<RunSummary, Box<dyn Error>> {
    let mut rng = SimulationRng::new(config.simulation.seed)?;

    let mut localization_config = config.localization.clone();
    if localization_config.baseframe.seed.is_none() {
        localization_config.baseframe.seed = config.simulation.seed;
    }
    let estimator_anchors_itself = localization_config.skips_initialization();

    let Localizer { sensor, .. } = config.localizer;
    let estimator = Arc::new(RecordingEstimator::with_structure_support());
    let handler = LocalizationHandler::new(localization_config, camera_rig(&config.camera, sensor), estimator.clone())?;

    let truth = GroundTruth::new(config.trajectory, config.drift);
    let localizer = SyntheticLocalizer::new(config.localizer, &config.camera)?;

    let pose_period_s = 1.0 / config.simulation.pose_rate_hz;
    let localization_period_s = 1.0 / config.localizer.rate_hz;
    let steps = (config.simulation.duration_s / pose_period_s).floor() as usize;
    info!(
        "Running {} s of simulated time ({} estimator poses).",
        config.simulation.duration_s, steps
    );

    let mut summary = RunSummary::default();
    let mut next_localization_s = config.localizer.latency_s;

    for step in 0..=steps {
        let t_s = step as f64 * pose_period_s;
        let t_ns = seconds_to_nanos(t_s);

        for outcome in handler.process_pose_sample(PoseSample::new(t_ns, truth.t_m_i(t_s))) {
            summary.record(&outcome);
        }

        if estimator_anchors_itself {
            let localized = !estimator.pose_updates().is_empty();
            let status = EstimatorStatus {
                initialized: true,
                localized,
                t_g_m: Some(truth.t_g_m(t_s)),
            };
            estimator.set_status(status);
            handler.process_estimator_status(&status);
        }

        // Localizations arrive `latency` after the moment they describe.
        while next_localization_s <= t_s {
            let captured_s = next_localization_s - config.localizer.latency_s;
            let captured_ns = localization_timestamp(config, seconds_to_nanos(captured_s));
            let observation = localizer.localize(captured_ns, &truth.t_g_b(captured_s), &mut rng.0);

            let outcome = handler.process_localization_result(observation);
            debug!("t = {:.2}s: {:?}", captured_s, outcome);
            summary.observations += 1;
            summary.record(&outcome);
            next_localization_s += localization_period_s;
        }
    }

    summary.pose_updates = estimator.pose_updates().len();
    summary.correspondence_updates = estimator.correspondence_updates().len();
    summary.baseframe_resets = estimator.baseframe_resets().len();
    summary.final_state = Some(handler.state());
    if let Some(baseframe) = handler.baseframe() {
        let true_t_g_m = truth.t_g_m(config.simulation.duration_s);
        summary.baseframe_translation_error_m = Some(translation_error(baseframe.t_g_m(), &true_t_g_m));
        summary.baseframe_rotation_error_deg = Some(rotation_error(baseframe.t_g_m(), &true_t_g_m).to_degrees());
    }
    Ok(summary)
}
