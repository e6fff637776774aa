use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bilby_bundle::request::job::{StatusDetails, SubmitDetails};
use bilby_bundle::request::message::read_job_parameters;
use bilby_bundle::settings::Settings;
use bilby_bundle::Bundle;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::{json, Value};

/// Submit bilby jobs to SLURM or HTCondor and report their status as JSON
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job, printing the id to poll it with
    Submit {
        /// Job controller's id for the job
        #[arg(long)]
        job_id: i64,
        /// Job parameter document (JSON)
        #[arg(long)]
        params: PathBuf,
    },
    /// Print the status of a submitted job
    Status {
        #[arg(long)]
        scheduler_id: i64,
    },
    /// Remove a job's working directory
    Delete {
        #[arg(long)]
        job_id: i64,
        /// Job controller's job record (JSON)
        #[arg(long)]
        job_data: Option<PathBuf>,
    },
    /// Cancel a running SLURM job
    Cancel {
        #[arg(long)]
        scheduler_id: i64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    info!("bilby-bundle {} starting", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut bundle = Bundle::from_settings(cli.settings).context("Opening job store")?;

    match cli.command {
        Commands::Submit { job_id, params } => {
            let content = read_job_request(&params)
                .with_context(|| format!("Reading {}", params.display()))?;
            let params = read_job_parameters(&content)?;
            match bundle.submit(&SubmitDetails { job_id }, &params)? {
                Some(scheduler_id) => println!("{}", json!({ "scheduler_id": scheduler_id })),
                None => bail!("Job {job_id} could not be submitted"),
            }
        }
        Commands::Status { scheduler_id } => {
            let status = bundle.status(&StatusDetails { scheduler_id })?;
            println!("{}", serde_json::to_string(&status)?);
        }
        Commands::Delete { job_id, job_data } => {
            let job_data = match job_data {
                Some(path) => {
                    let content = read_job_request(&path).unwrap_or_default();
                    serde_json::from_str(&content).unwrap_or(Value::Null)
                }
                None => Value::Null,
            };
            bundle.delete(&SubmitDetails { job_id }, &job_data);
        }
        Commands::Cancel { scheduler_id } => {
            bundle.cancel(&StatusDetails { scheduler_id })?;
        }
    }

    Ok(())
}

fn read_job_request(file_path: &Path) -> Option<String> {
    match fs::read_to_string(file_path) {
        Ok(string) => {
            info!("Reading job request: {}", file_path.display());
            Some(string)
        }
        Err(_) => {
            warn!("Can't read job request at path: {}", file_path.display());
            None
        }
    }
}
