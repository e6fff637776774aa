//! All in-flight job state is stored in a SQLite database
//!
//! The database is shared by every process handling job controller requests on a host, so each
//! store operation runs in its own exclusive transaction: SQLite's file lock is the
//! cross-process lock, held for the whole read-modify-write.

/// Connect to a SQLite database
pub mod open;
/// Job records and the job id counter
pub mod job;

pub use job::{JobRecord, JobStore};
