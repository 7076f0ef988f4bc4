// locus_sim/src/simulation/sensors/mod.rs

pub mod localizer;

pub use localizer::SyntheticLocalizer;
