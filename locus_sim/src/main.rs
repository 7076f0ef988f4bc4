// locus_sim/src/main.rs

use std::error::Error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use locus_sim::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if !cli.scenario.is_file() {
        return Err(format!("scenario file not found: {}", cli.scenario.display()).into());
    }

    let mut config = load_scenario(&cli.scenario)?;
    cli.apply_overrides(&mut config);
    config.localization.validate()?;

    let summary = run_scenario(&config)?;
    summary.log();
    Ok(())
}
