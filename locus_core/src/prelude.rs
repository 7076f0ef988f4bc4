// locus_core/src/prelude.rs

// --- Core Abstractions ---
pub use crate::clock::TimeTranslation;
pub use crate::estimation::StateEstimator;
pub use crate::models::camera::CameraModel;

// --- Entry Point ---
pub use crate::handler::{Correction, LocalizationHandler, LocalizationOutcome};

// --- Data Structures ---
pub use crate::baseframe::{Baseframe, BaseframeSource};
pub use crate::messages::{
    Correspondence, CorrespondenceUpdate, EstimatorStatus, LocalizationObservation, PoseUpdate,
    SensorCorrespondences,
};
pub use crate::state::{LocalizationState, Route};
pub use crate::types::{Pose, PoseSample, SensorIndex, Timestamp};

// --- Configuration & Errors ---
pub use crate::config::{LocalizationConfig, LocalizationMode};
pub use crate::error::{ConfigError, LocalizationError, QualityRejection};

// --- Concrete Implementations ---
pub use crate::clock::ClockAligner;
pub use crate::estimation::RecordingEstimator;
pub use crate::models::camera::{CameraRig, CameraSensor, PinholeCamera};
