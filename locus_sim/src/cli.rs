use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use locus_core::config::LocalizationMode;

use crate::simulation::config::ScenarioConfig;

/// Locus: drives the localization fusion core through a synthetic scenario.
///
/// Values given on the command line override the ones in the scenario file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/direct_pose.toml")]
    pub scenario: PathBuf,

    /// Seed for every random draw in the run.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulated duration in seconds.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// How accepted localizations are fed to the estimator.
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    DirectPose,
    Structure,
}

impl From<ModeArg> for LocalizationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::DirectPose => LocalizationMode::DirectPose,
            ModeArg::Structure => LocalizationMode::StructureCorrespondence,
        }
    }
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(duration) = self.duration {
            config.simulation.duration_s = duration;
        }
        if let Some(mode) = self.mode {
            config.localization.mode = mode.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_scenario_values() {
        let cli = Cli::parse_from(["locus_sim", "--seed", "3", "--mode", "structure", "-d", "5"]);
        let mut config = ScenarioConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.simulation.seed, Some(3));
        assert_eq!(config.simulation.duration_s, 5.0);
        assert_eq!(config.localization.mode, LocalizationMode::StructureCorrespondence);
    }

    #[test]
    fn absent_flags_leave_the_scenario_alone() {
        let cli = Cli::parse_from(["locus_sim"]);
        let mut config = ScenarioConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(cli.scenario, PathBuf::from("assets/scenarios/direct_pose.toml"));
    }
}
