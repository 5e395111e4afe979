mod cli;
mod costing;
mod db;
mod error;
mod evm;
mod forecast;
mod grouping;
mod import;
mod models;
mod progress;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let db_path = get_db_path()?;
    let mut db = db::Database::open(&db_path)?;

    match args.len() {
        2.. => cli::as_cli(&args, &mut db),
        _ => {
            cli::as_cli(&["jobcost".into(), "--help".into()], &mut db)
        }
    }
}

fn get_db_path() -> Result<std::path::PathBuf> {
    if let Ok(path) = std::env::var("JOBCOST_DB") {
        return Ok(std::path::PathBuf::from(path));
    }
    let proj_dirs = directories::ProjectDirs::from("com", "jobcost", "JobCost")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("jobcost.db"))
}
