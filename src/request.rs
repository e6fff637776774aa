//! Job controller requests
//!
//! Job parameter documents are validated against a JSON schema before being deserialised.

/// Request payloads
pub mod job;
/// Validate and deserialise job parameter documents
pub mod message;
/// Load the embedded job parameter schema
pub mod schema;

pub use job::{JobParameters, StatusDetails, SubmitDetails, SupportingFile, SupportingFileType};
