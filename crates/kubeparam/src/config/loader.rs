use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::resource::{MappingRecord, ProjectMappingResource};
use crate::error::ConfigError;

/// Reads a multi-document YAML file of ProjectMapping documents.
pub fn load_mappings<P: AsRef<Path>>(path: P) -> Result<Vec<MappingRecord>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_mappings_from_str(&content)
}

/// Parses a multi-document YAML stream of ProjectMapping documents. Empty
/// documents are skipped.
pub fn load_mappings_from_str(content: &str) -> Result<Vec<MappingRecord>, ConfigError> {
    let mut records = Vec::new();

    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document).map_err(|e| ConfigError::ParseYaml(e.to_string()))?;
        if value.is_null() {
            continue;
        }

        let resource: ProjectMappingResource =
            serde_json::from_value(value).map_err(|e| ConfigError::ParseYaml(e.to_string()))?;
        resource.check()?;

        debug!(name = %resource.metadata.name, "Loaded ProjectMapping");
        records.push(resource.into_record());
    }

    Ok(records)
}
