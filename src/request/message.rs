use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;

use crate::request::job::JobParameters;
use crate::request::schema::load_schema;
use crate::{BundleError, Result};

/// A job parameter document as received from the job controller
pub struct Message<'a> {
    pub content: &'a str,
    pub compiled_schema: JSONSchema,
}

impl<'a> Message<'a> {
    pub fn new(content: &'a str) -> Result<Message<'a>> {
        Ok(Message { content, compiled_schema: load_schema()? })
    }

    pub fn read(&self) -> Result<JobParameters> {
        let json: Value = self.parse_untyped_json()?;

        match self.validate(&json) {
            Ok(_) => {
                info!("Message is valid");
                self.parse_json(json)
            }
            Err(err) => {
                warn!("Message fails validation");
                Err(err)
            }
        }
    }

    fn validate(&self, json: &Value) -> Result<()> {
        info!("Validating job parameters against JSON schema");
        self.compiled_schema.validate(json).map_err(|errors| {
            let messages: Vec<String> = errors.map(|err| err.to_string()).collect();
            BundleError::InvalidParameters(messages.join("; "))
        })
    }

    fn parse_json(&self, value: Value) -> Result<JobParameters> {
        info!("Deserialising valid JSON into typed Rust object");
        // from_value is a generic function, so request JobParameters specifically
        Ok(serde_json::from_value::<JobParameters>(value)?)
    }

    fn parse_untyped_json(&self) -> Result<Value> {
        info!("Parsing JSON into untyped structure");
        // from_str is a generic function, so request Value (generic json) specifically
        Ok(serde_json::from_str::<Value>(self.content)?)
    }
}

/// Validate and deserialise a job parameter document
pub fn read_job_parameters(content: &str) -> Result<JobParameters> {
    Message::new(content)?.read()
}
