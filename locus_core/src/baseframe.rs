// locus_core/src/baseframe.rs

//! Estimation of `T_G_M`, the transform from the estimator's drifting local
//! frame (M) into the global map frame (G).
//!
//! Every localization yields one noisy single-shot estimate
//! `T_G_M = T_G_B * T_M_I^-1`. Estimates are collected in a small ring buffer and
//! fused by RANSAC once enough of them agree.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::BaseframeConfig;
use crate::error::LocalizationError;
use crate::transforms::{canonicalize_pose, is_canonical, mean_pose, rotation_error, translation_error};
use crate::types::Pose;

// =========================================================================
// == Adopted Baseframe ==
// =========================================================================

/// Where an adopted baseframe came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseframeSource {
    /// Our own RANSAC fit over collected estimates.
    Consensus { inliers: usize, samples: usize },
    /// Reported by the estimator, which anchors itself.
    Estimator,
}

/// An immutable, canonicalized `T_G_M`.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseframe {
    t_g_m: Pose,
    pub source: BaseframeSource,
    /// Prior uncertainty handed along with the transform when it resets an estimator.
    pub position_covariance_m2: f64,
    pub rotation_covariance_rad2: f64,
}

impl Baseframe {
    pub fn new(t_g_m: &Pose, source: BaseframeSource, config: &BaseframeConfig) -> Self {
        let t_g_m = canonicalize_pose(t_g_m);
        assert!(
            is_canonical(&t_g_m.rotation),
            "Baseframe: rotation not canonical after canonicalization: {:?}",
            t_g_m.rotation
        );
        Self {
            t_g_m,
            source,
            position_covariance_m2: config.init_position_covariance_m2,
            rotation_covariance_rad2: config.init_rotation_covariance_rad2,
        }
    }

    pub fn t_g_m(&self) -> &Pose {
        &self.t_g_m
    }
}

/// The single authoritative baseframe. Writers swap in a whole new snapshot;
/// readers clone the `Arc` and never observe a half-written transform.
#[derive(Debug, Default)]
pub struct SharedBaseframe {
    current: RwLock<Option<Arc<Baseframe>>>,
}

impl SharedBaseframe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, baseframe: Baseframe) -> Arc<Baseframe> {
        let snapshot = Arc::new(baseframe);
        *self.current.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn load(&self) -> Option<Arc<Baseframe>> {
        self.current.read().clone()
    }
}

// =========================================================================
// == Candidate Buffer ==
// =========================================================================

/// Fixed-capacity ring of single-shot `T_G_M` estimates, oldest first.
#[derive(Debug)]
pub struct CandidateBaseframeBuffer {
    capacity: usize,
    samples: Mutex<VecDeque<Pose>>,
}

impl CandidateBaseframeBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CandidateBaseframeBuffer: capacity must be positive");
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Inserts an estimate, evicting the oldest one when full. Returns the new size.
    pub fn insert(&self, t_g_m: Pose) -> usize {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(t_g_m);
        assert!(samples.len() <= self.capacity);
        samples.len()
    }

    /// Copy of the buffered estimates in insertion order.
    pub fn snapshot(&self) -> Vec<Pose> {
        self.samples.lock().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// =========================================================================
// == RANSAC ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacThresholds {
    pub max_iterations: usize,
    pub rotation_rad: f64,
    pub translation_m: f64,
}

impl From<&BaseframeConfig> for RansacThresholds {
    fn from(config: &BaseframeConfig) -> Self {
        Self {
            max_iterations: config.max_ransac_iterations,
            rotation_rad: config.rotation_threshold_deg.to_radians(),
            translation_m: config.translation_threshold_m,
        }
    }
}

/// Outcome of a consensus fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseframeFit {
    /// Least-squares refinement over the inliers, canonicalized.
    pub t_g_m: Pose,
    pub num_inliers: usize,
    pub num_samples: usize,
    /// Indices into the sample slice.
    pub inliers: Vec<usize>,
}

/// Robust consensus over a set of transform estimates.
///
/// Each iteration draws one sample as the hypothesis (a single transform is a
/// minimal set) and counts the samples that agree with it within both thresholds.
/// The largest consensus set is refined by its least-squares mean.
/// Returns `None` for an empty input.
pub fn transformation_ransac<R: Rng + ?Sized>(
    samples: &[Pose],
    thresholds: &RansacThresholds,
    rng: &mut R,
) -> Option<BaseframeFit> {
    if samples.is_empty() {
        return None;
    }

    let mut best_inliers: Vec<usize> = Vec::new();
    for _ in 0..thresholds.max_iterations {
        let hypothesis = &samples[rng.gen_range(0..samples.len())];
        let inliers = find_inliers(samples, hypothesis, thresholds);
        if inliers.len() > best_inliers.len() {
            best_inliers = inliers;
            if best_inliers.len() == samples.len() {
                break;
            }
        }
    }

    let t_g_m = mean_pose(best_inliers.iter().map(|&i| &samples[i]))?;
    Some(BaseframeFit {
        t_g_m,
        num_inliers: best_inliers.len(),
        num_samples: samples.len(),
        inliers: best_inliers,
    })
}

fn find_inliers(samples: &[Pose], hypothesis: &Pose, thresholds: &RansacThresholds) -> Vec<usize> {
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            rotation_error(s, hypothesis) < thresholds.rotation_rad
                && translation_error(s, hypothesis) < thresholds.translation_m
        })
        .map(|(i, _)| i)
        .collect()
}

// =========================================================================
// == Estimator ==
// =========================================================================

/// Collects single-shot `T_G_M` estimates and fits a consensus baseframe.
#[derive(Debug)]
pub struct BaseframeEstimator {
    config: BaseframeConfig,
    candidates: CandidateBaseframeBuffer,
    rng: Mutex<ChaCha8Rng>,
}

impl BaseframeEstimator {
    pub fn new(config: BaseframeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            candidates: CandidateBaseframeBuffer::new(config.min_num_estimates),
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &BaseframeConfig {
        &self.config
    }

    pub fn candidates(&self) -> &CandidateBaseframeBuffer {
        &self.candidates
    }

    /// Buffers `T_G_B * T_M_I^-1` and attempts a fit.
    pub fn add_estimate(&self, t_g_b: &Pose, t_m_i: &Pose) -> Result<Baseframe, LocalizationError> {
        self.candidates.insert(t_g_b * t_m_i.inverse());
        self.try_fit()
    }

    /// Fits the buffered estimates. On success the buffer is cleared.
    pub fn try_fit(&self) -> Result<Baseframe, LocalizationError> {
        let samples = self.candidates.snapshot();
        if samples.len() < self.config.min_num_estimates {
            return Err(LocalizationError::CollectingEstimates {
                collected: samples.len(),
                required: self.config.min_num_estimates,
            });
        }

        let required = (samples.len() as f64 * self.config.inlier_ratio).ceil() as usize;
        let thresholds = RansacThresholds::from(&self.config);
        let fit = {
            let mut rng = self.rng.lock();
            transformation_ransac(&samples, &thresholds, &mut *rng)
        };

        let num_inliers = fit.as_ref().map_or(0, |f| f.num_inliers);
        let fit = match fit {
            Some(fit) if num_inliers >= required => fit,
            _ => {
                debug!(
                    "Too few localization transformation inliers ({}/{}).",
                    num_inliers,
                    samples.len()
                );
                return Err(LocalizationError::InsufficientConsensus {
                    inliers: num_inliers,
                    samples: samples.len(),
                    required,
                });
            }
        };

        self.candidates.clear();
        Ok(Baseframe::new(
            &fit.t_g_m,
            BaseframeSource::Consensus {
                inliers: fit.num_inliers,
                samples: fit.num_samples,
            },
            &self.config,
        ))
    }

    pub fn reset(&self) {
        self.candidates.clear();
    }
}
