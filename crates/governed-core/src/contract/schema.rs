//! JSON Schema validation for task contracts.
//!
//! Contracts arriving as JSON are validated against
//! `schema/task_contract.schema.json` before deserialization, so callers get
//! every structural problem at once instead of the first serde error.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded contract schema (loaded at compile time).
const CONTRACT_SCHEMA_JSON: &str = include_str!("../../schema/task_contract.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

/// Get or initialize the compiled schema validator.
fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(CONTRACT_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a task contract JSON value against the schema.
///
/// Returns every validation error message on failure.
pub fn validate_contract_schema(contract_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(contract_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check if a contract JSON value is valid against the schema.
pub fn is_valid_contract(contract_json: &serde_json::Value) -> bool {
    get_validator()
        .map(|v| v.is_valid(contract_json))
        .unwrap_or(false)
}
