/// Embedded JSON schemas and validation against them
use crate::error::{FilteringError, Result};
use serde_json::Value;

const SEGMENT_METADATA: &str = include_str!("../schemas/segment_metadata.json");
const PDAL: &str = include_str!("../schemas/pdal.json");
const PDAL_PIPELINE: &str = include_str!("../schemas/pdal_pipeline.json");

/// Load one of the bundled schemas by filename
pub fn load_schema(name: &str) -> Result<Value> {
    let source = match name {
        "segment_metadata.json" => SEGMENT_METADATA,
        "pdal.json" => PDAL,
        "pdal_pipeline.json" => PDAL_PIPELINE,
        other => return Err(FilteringError::UnknownSchema(other.to_string())),
    };
    Ok(serde_json::from_str(source)?)
}

/// Validate an instance against a bundled schema, collecting every violation.
pub fn validate(instance: &Value, schema_name: &str) -> Result<()> {
    let schema = load_schema(schema_name)?;
    let validator = jsonschema::validator_for(&schema).map_err(|e| {
        FilteringError::SchemaValidation {
            schema: schema_name.to_string(),
            messages: vec![e.to_string()],
        }
    })?;

    let messages: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| format!("{} at '{}'", e, e.instance_path))
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(FilteringError::SchemaValidation {
            schema: schema_name.to_string(),
            messages,
        })
    }
}
