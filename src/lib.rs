//! Submission and status tracking of bilby parameter estimation jobs on SLURM and HTCondor
//!
//! A job controller hands over a job parameter document, which is turned into a pipeline
//! configuration, rendered into scheduler scripts and submitted. In-flight jobs are tracked in a
//! small SQLite job store and polled to produce a unified status.

pub mod aggregate;
pub mod bundle;
pub mod db;
pub mod error;
pub mod pipe;
pub mod request;
pub mod scheduler;
/// Deployment configuration
pub mod settings;
pub mod status;
pub mod submit;

pub use bundle::Bundle;
pub use error::{BundleError, Result};
