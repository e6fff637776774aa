//! Local data generation for SLURM jobs analysing real detector data
//!
//! Data generation downloads strain data, which compute nodes can't do without outbound network
//! access. The generation stage is cut out of the master script and run on the submitting host
//! before the rest of the chain is submitted.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::info;
use regex::Regex;

use crate::{BundleError, Result};

/// The generation stage's `sbatch` invocation, removed from the master script
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExcisedStage {
    /// The removed `sbatch` line
    pub command: String,
    /// bash array the master script stored the stage's job id in
    pub jid: String,
    pub script: PathBuf,
    pub output: PathBuf,
    pub error: PathBuf,
}

/// Remove the generation stage's `sbatch` line and the line recording its id from the master
/// script at `path`, rewriting it in place
pub fn excise_generation(path: &Path) -> Result<ExcisedStage> {
    let script = fs::read_to_string(path)?;
    let (remaining, excised) = excise(&script)?;
    info!("Removed generation stage from {}", path.display());
    fs::write(path, remaining)?;
    Ok(excised)
}

fn excise(script: &str) -> Result<(String, ExcisedStage)> {
    let line = script
        .lines()
        .find(|line| {
            line.contains("$(sbatch")
                && line.split_whitespace().any(|t| t == "--job-name=generation")
        })
        .ok_or_else(|| {
            BundleError::DataGeneration("no generation stage in master script".to_string())
        })?;
    let excised = parse_sbatch_line(line)?;

    let jid_ref = format!("${{{}[-1]}}", excised.jid);
    let remaining: Vec<&str> = script
        .lines()
        .filter(|l| *l != line)
        .filter(|l| !(l.trim_start().starts_with("echo ") && l.contains(&jid_ref)))
        .collect();
    let mut remaining = remaining.join("\n");
    remaining.push('\n');
    Ok((remaining, excised))
}

/// Split `jid0=($(sbatch ... --output=a --error=b script.sh))` into its parts
fn parse_sbatch_line(line: &str) -> Result<ExcisedStage> {
    let malformed = || BundleError::DataGeneration(format!("can't parse sbatch line {line:?}"));
    let (jid, invocation) = line.trim().split_once("=($(").ok_or_else(malformed)?;
    let invocation = invocation.strip_suffix("))").ok_or_else(malformed)?;

    let mut output = None;
    let mut error = None;
    for token in invocation.split_whitespace() {
        if let Some(path) = token.strip_prefix("--output=") {
            output = Some(PathBuf::from(path));
        } else if let Some(path) = token.strip_prefix("--error=") {
            error = Some(PathBuf::from(path));
        }
    }
    let script = invocation.split_whitespace().last().ok_or_else(malformed)?;

    Ok(ExcisedStage {
        command: line.to_string(),
        jid: jid.to_string(),
        script: PathBuf::from(script),
        output: output.ok_or_else(malformed)?,
        error: error.ok_or_else(malformed)?,
    })
}

/// Run the excised stage's script with bash, blocking until it finishes
///
/// Output goes to the log files the stage would have written under SLURM. A nonzero exit is
/// an error.
pub fn run_locally(stage: &ExcisedStage, working_directory: &Path) -> Result<()> {
    for log in [&stage.output, &stage.error] {
        if let Some(dir) = log.parent() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut bash = Command::new("bash");
    let cmd = bash
        .arg(&stage.script)
        .current_dir(working_directory)
        .stdin(Stdio::null())
        .stdout(File::create(&stage.output)?)
        .stderr(File::create(&stage.error)?);
    info!("Running data generation locally");
    info!("{:?}", &cmd);

    let status = cmd.status()?;
    if !status.success() {
        return Err(BundleError::DataGeneration(format!(
            "{} exited with {status}, see {}",
            stage.script.display(),
            stage.error.display()
        )));
    }
    Ok(())
}

/// Remove every `afterok` dependency on the excised stage from the master script
pub fn strip_dependencies(path: &Path, stage: &ExcisedStage) -> Result<()> {
    let script = fs::read_to_string(path)?;
    fs::write(path, strip(&script, &stage.jid)?)?;
    Ok(())
}

fn strip(script: &str, jid: &str) -> Result<String> {
    let token = format!(r"--dependency=afterok:\$\{{{}\[-1\]\}}[ \t]*", regex::escape(jid));
    let pattern = Regex::new(&token).map_err(|err| BundleError::DataGeneration(err.to_string()))?;
    Ok(pattern.replace_all(script, "").into_owned())
}
