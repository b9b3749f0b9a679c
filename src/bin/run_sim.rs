//! CLI entry point: load a configuration document, run one simulation to
//! completion, and write the per-tick and end-of-run CSV reports.

use auction_sim::config::SimConfig;
use auction_sim::output::{write_agent_stats, write_data_points};
use auction_sim::{SimResult, Simulation};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "run_sim", about = "Run a continuous double-auction market simulation")]
struct Cli {
    /// Path to the JSON configuration document.
    config: PathBuf,

    /// Where to write the per-tick data point CSV.
    #[arg(long, default_value = "data_points.csv")]
    data_points_out: PathBuf,

    /// Where to write the end-of-run per-agent stats CSV.
    #[arg(long, default_value = "agent_stats.csv")]
    agent_stats_out: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: &Cli) -> SimResult<()> {
    log::info!("loading config from {}", cli.config.display());
    let config = SimConfig::load_from_path(&cli.config)?;

    let mut sim = Simulation::new(&config)?;
    sim.run()?;

    let data_points = sim.data_points();
    log::info!("writing {} data points to {}", data_points.len(), cli.data_points_out.display());
    write_data_points(File::create(&cli.data_points_out)?, &data_points, sim.volatility_window())?;

    let stats = sim.agent_stats();
    log::info!("writing {} agent stats rows to {}", stats.len(), cli.agent_stats_out.display());
    write_agent_stats(File::create(&cli.agent_stats_out)?, &stats)?;

    Ok(())
}
