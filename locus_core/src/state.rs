// locus_core/src/state.rs

use std::fmt;

/// Whether the estimator's local frame is currently anchored to the global frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalizationState {
    /// No baseframe has ever been established.
    Uninitialized,
    /// A baseframe existed but corrections stopped agreeing with it.
    NotLocalized,
    Localized,
}

/// What to do with an incoming localization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Feed it to the baseframe estimator.
    Initialize,
    /// Use it to correct the estimator.
    Correct,
}

impl LocalizationState {
    /// The state a fresh handler starts in. When the estimator anchors itself
    /// there is nothing to initialize and every localization is a correction.
    pub fn initial(skip_initialization: bool) -> Self {
        if skip_initialization {
            LocalizationState::Localized
        } else {
            LocalizationState::Uninitialized
        }
    }

    pub fn route(self) -> Route {
        match self {
            LocalizationState::Uninitialized | LocalizationState::NotLocalized => Route::Initialize,
            LocalizationState::Localized => Route::Correct,
        }
    }

    /// A consensus baseframe was adopted.
    pub fn on_baseframe_adopted(self) -> Self {
        LocalizationState::Localized
    }

    /// A correction failed the quality checks.
    pub fn on_quality_rejected(self, demote: bool) -> Self {
        match self {
            LocalizationState::Localized if demote => LocalizationState::NotLocalized,
            other => other,
        }
    }

    pub fn is_localized(self) -> bool {
        self == LocalizationState::Localized
    }
}

impl fmt::Display for LocalizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalizationState::Uninitialized => write!(f, "uninitialized"),
            LocalizationState::NotLocalized => write!(f, "not localized"),
            LocalizationState::Localized => write!(f, "localized"),
        }
    }
}
