//! K8s-style ProjectMapping documents and the raw records they carry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// The API version of ProjectMapping documents.
pub const API_VERSION: &str = "kubetruth.cloudtruth.com/v1";

/// The kind of ProjectMapping documents.
pub const KIND: &str = "ProjectMapping";

/// Whether a mapping supplies the defaults or applies to selected projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingScope {
    Root,
    #[default]
    Override,
}

impl MappingScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingScope::Root => "root",
            MappingScope::Override => "override",
        }
    }
}

impl std::fmt::Display for MappingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MappingScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(MappingScope::Root),
            "override" => Ok(MappingScope::Override),
            _ => Err(format!("Unknown mapping scope: {}", s)),
        }
    }
}

/// Metadata for a mapping document, following K8s conventions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// One ProjectMapping document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMappingResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Map<String, Value>,
}

impl ProjectMappingResource {
    pub fn new(name: impl Into<String>, spec: Map<String, Value>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta {
                name: name.into(),
                labels: BTreeMap::new(),
            },
            spec,
        }
    }

    /// Checks the document header.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::InvalidResource {
                name: self.metadata.name.clone(),
                message: format!(
                    "Invalid API version '{}', expected '{}'",
                    self.api_version, API_VERSION
                ),
            });
        }
        if self.kind != KIND {
            return Err(ConfigError::InvalidResource {
                name: self.metadata.name.clone(),
                message: format!("Unknown kind '{}', expected '{}'", self.kind, KIND),
            });
        }
        Ok(())
    }

    pub fn into_record(self) -> MappingRecord {
        MappingRecord::new(self.metadata.name, self.spec)
    }
}

/// Untyped mapping data as supplied by the config source: the spec's fields
/// plus the mapping's name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingRecord {
    pub name: String,
    pub fields: Map<String, Value>,
}

impl MappingRecord {
    pub fn new(name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// The record's `scope` field; absent means override.
    pub fn scope(&self) -> Result<MappingScope, ConfigError> {
        match self.fields.get("scope") {
            None => Ok(MappingScope::Override),
            Some(Value::String(s)) => s.parse().map_err(|reason| ConfigError::InvalidMapping {
                name: self.name.clone(),
                reason,
            }),
            Some(other) => Err(ConfigError::InvalidMapping {
                name: self.name.clone(),
                reason: format!("scope must be a string, got {}", other),
            }),
        }
    }

    /// The fields with `name` filled in from the record name unless the
    /// fields carry their own.
    pub fn named_fields(&self) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        if !fields.contains_key("name") {
            fields.insert("name".to_string(), Value::String(self.name.clone()));
        }
        fields
    }
}
