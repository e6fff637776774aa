use jsonschema::JSONSchema;
use serde_json::Value;

use crate::{BundleError, Result};

/// included job parameter schema
static JOB_PARAMETERS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/data/schema/job_parameters.json"
));

pub fn load_schema() -> Result<JSONSchema> {
    let schema: Value = serde_json::from_str(JOB_PARAMETERS)?;
    compile_schema(&schema)
}

fn compile_schema(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .compile(schema)
        .map_err(|err| BundleError::InvalidParameters(format!("invalid schema: {err}")))
}
