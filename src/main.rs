// Entry point: generates every figure with default arguments.
use std::process::ExitCode;

use moonpies_figures::config::AppConfig;
use moonpies_figures::figures::{default_jobs, generate_all};
use moonpies_figures::sim::synthetic::SyntheticSimulation;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "moonpies.toml";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("moonpies_figures=info")),
        )
        .with_target(false)
        .init();

    let cfg = AppConfig::load_or_default(CONFIG_PATH);
    let jobs = default_jobs(SyntheticSimulation, &cfg.simulation, &cfg.figures);
    let reports = generate_all(jobs, cfg.figures.workers);

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.result.is_err())
        .map(|r| r.name.as_str())
        .collect();
    if failed.is_empty() {
        info!("All figures written to {}", cfg.figures.figs_dir.display());
        ExitCode::SUCCESS
    } else {
        error!("{} figure(s) failed: {}", failed.len(), failed.join(", "));
        ExitCode::FAILURE
    }
}
