//! Schema validation of raw mapping records.

use jsonschema::Validator;
use serde_json::Value;

use super::resource::MappingRecord;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/project-mapping-v1.json");

/// Validates mapping fields against the embedded ProjectMapping schema.
pub struct MappingValidator {
    validator: Validator,
}

impl MappingValidator {
    pub fn new() -> Result<Self, ConfigError> {
        let schema: Value = serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

        let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

        Ok(Self { validator })
    }

    pub fn validate(&self, record: &MappingRecord) -> Result<(), ConfigError> {
        let instance = Value::Object(record.fields.clone());
        let errors: Vec<String> = self
            .validator
            .iter_errors(&instance)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::SchemaValidation {
                name: record.name.clone(),
                errors: errors.join("; "),
            })
        }
    }
}

impl std::fmt::Debug for MappingValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> MappingRecord {
        match fields {
            Value::Object(map) => MappingRecord::new("test", map),
            other => panic!("expected a map, got {other}"),
        }
    }

    #[test]
    fn test_valid_record() {
        let validator = MappingValidator::new().unwrap();
        let record = record(json!({
            "scope": "override",
            "project_selector": "^svc",
            "skip": false,
            "tag": null,
            "context": {"a": {"b": 1}},
            "active_templates": ["configmap"],
            "resource_templates": {"configmap": "kind: ConfigMap"}
        }));
        assert!(validator.validate(&record).is_ok());
    }

    #[test]
    fn test_invalid_records() {
        let validator = MappingValidator::new().unwrap();
        let cases = vec![
            ("unknown field", json!({"bogus": 1})),
            ("bad scope", json!({"scope": "global"})),
            ("wrong type", json!({"skip": "yes"})),
            ("non-string template", json!({"resource_templates": {"cm": 3}})),
        ];

        for (label, fields) in cases {
            let result = validator.validate(&record(fields));
            assert!(
                matches!(result, Err(ConfigError::SchemaValidation { .. })),
                "{}: {:?}",
                label,
                result
            );
        }
    }
}
