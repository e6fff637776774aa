use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Job store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Job not found in job store: {0}")]
    JobNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid job parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid pipeline configuration: {0}")]
    Ini(String),

    #[error("Template error: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error("Supporting file download failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Local data generation failed: {0}")]
    DataGeneration(String),

    #[error("Scheduler command `{command}` failed: {stderr}")]
    SchedulerCommand { command: String, stderr: String },

    #[error("Not supported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, BundleError>;
