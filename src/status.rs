//! Canonical job status reported regardless of the underlying scheduler

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified job state
///
/// Variants are declared in ascending order of their numeric code, so the derived ordering
/// matches the codes: every in-flight state compares `<= Running` and every terminal state
/// (success or failure) compares `> Running`. The codes are the ones the job controller stores.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum JobStatus {
    Submitted = 30,
    Queued = 40,
    Running = 50,
    Cancelled = 70,
    Error = 400,
    WallTimeExceeded = 401,
    OutOfMemory = 402,
    Completed = 500,
}

impl JobStatus {
    /// Still waiting on the scheduler
    pub fn is_in_flight(&self) -> bool {
        *self <= JobStatus::Running
    }

    /// Terminal and not successful
    pub fn is_failure(&self) -> bool {
        *self > JobStatus::Running && *self != JobStatus::Completed
    }
}

impl From<JobStatus> for u32 {
    fn from(status: JobStatus) -> u32 {
        status as u32
    }
}

impl TryFrom<u32> for JobStatus {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, String> {
        match code {
            30 => Ok(JobStatus::Submitted),
            40 => Ok(JobStatus::Queued),
            50 => Ok(JobStatus::Running),
            70 => Ok(JobStatus::Cancelled),
            400 => Ok(JobStatus::Error),
            401 => Ok(JobStatus::WallTimeExceeded),
            402 => Ok(JobStatus::OutOfMemory),
            500 => Ok(JobStatus::Completed),
            other => Err(format!("unknown job status code {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::WallTimeExceeded => write!(f, "wall time exceeded"),
            JobStatus::OutOfMemory => write!(f, "out of memory"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Status of one stage of a job, as reported to the job controller
///
/// `status` is `None` while the scheduler can't say what state the stage is in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub what: String,
    pub status: Option<JobStatus>,
    pub info: String,
}

impl StageStatus {
    pub fn new(what: &str, status: Option<JobStatus>, info: impl Into<String>) -> Self {
        StageStatus { what: what.to_string(), status, info: info.into() }
    }
}

/// Result of a status poll. `status` is always populated, even when the job is not complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Vec<StageStatus>,
    pub complete: bool,
}
