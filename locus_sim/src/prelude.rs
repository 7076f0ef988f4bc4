// locus_sim/src/prelude.rs

// Re-export the entire locus_core prelude so binaries can reach the core types directly.
pub use locus_core::prelude::*;

// Re-export common simulation-specific types.
pub use crate::cli::{Cli, ModeArg};
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::{load_scenario, parse_scenario};
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::runner::{run_scenario, RunSummary};
pub use crate::simulation::sensors::SyntheticLocalizer;
pub use crate::simulation::world::GroundTruth;
