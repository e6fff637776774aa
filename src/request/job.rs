use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a job on the job controller's side
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubmitDetails {
    pub job_id: i64,
}

/// Identifies a job by the id issued at submission
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StatusDetails {
    pub scheduler_id: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JobParameters {
    pub name: String,
    pub description: Option<String>,
    pub ini_string: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub supporting_files: Vec<SupportingFile>,
}

/// An auxiliary input file held by the job controller
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SupportingFile {
    #[serde(rename = "type")]
    pub file_type: SupportingFileType,
    /// Entry to set when the pipeline option is a dict (usually a detector name)
    pub key: Option<String>,
    pub file_name: String,
    /// Download token understood by the job controller
    pub token: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportingFileType {
    Psd,
    Cal,
    Pri,
    Gps,
    Tsl,
    Inj,
    Nmr,
    Dml,
    Dat,
}

impl SupportingFileType {
    /// Pipeline option the staged file is passed through
    pub fn attribute(&self) -> &'static str {
        match self {
            SupportingFileType::Psd => "psd_dict",
            SupportingFileType::Cal => "spline_calibration_envelope_dict",
            SupportingFileType::Pri => "prior_file",
            SupportingFileType::Gps => "gps_file",
            SupportingFileType::Tsl => "timeslide_file",
            SupportingFileType::Inj => "injection_file",
            SupportingFileType::Nmr => "numerical_relativity_file",
            SupportingFileType::Dml => "distance_marginalization_lookup_table",
            SupportingFileType::Dat => "data_dict",
        }
    }
}

impl fmt::Display for SupportingFileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SupportingFileType::Psd => "psd",
            SupportingFileType::Cal => "cal",
            SupportingFileType::Pri => "pri",
            SupportingFileType::Gps => "gps",
            SupportingFileType::Tsl => "tsl",
            SupportingFileType::Inj => "inj",
            SupportingFileType::Nmr => "nmr",
            SupportingFileType::Dml => "dml",
            SupportingFileType::Dat => "dat",
        };
        write!(f, "{name}")
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SupportingFile>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<SupportingFile>>::deserialize(deserializer)?.unwrap_or_default())
}
