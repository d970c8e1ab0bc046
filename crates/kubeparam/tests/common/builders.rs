//! Builder patterns for creating mapping records programmatically.

#![allow(dead_code)]

use kubeparam::config::MappingRecord;
use serde_json::{Map, Value};

/// Builder for creating `MappingRecord` instances.
pub struct MappingBuilder {
    name: String,
    fields: Map<String, Value>,
}

impl MappingBuilder {
    /// A root mapping.
    pub fn root(name: &str) -> Self {
        Self::with_scope(name, "root")
    }

    /// An override mapping selecting projects matching `selector`.
    pub fn overriding(name: &str, selector: &str) -> Self {
        Self::with_scope(name, "override").field("project_selector", selector)
    }

    fn with_scope(name: &str, scope: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("scope".to_string(), Value::from(scope));
        Self {
            name: name.to_string(),
            fields,
        }
    }

    /// Set any spec field.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn key_selector(self, selector: &str) -> Self {
        self.field("key_selector", selector)
    }

    pub fn environment(self, environment: &str) -> Self {
        self.field("environment", environment)
    }

    pub fn skip(self, skip: bool) -> Self {
        self.field("skip", skip)
    }

    /// Set the template context.
    pub fn context(self, context: Value) -> Self {
        self.field("context", context)
    }

    pub fn active_templates(self, names: &[&str]) -> Self {
        let names: Vec<Value> = names.iter().map(|n| Value::from(*n)).collect();
        self.field("active_templates", names)
    }

    /// Add a resource template.
    pub fn template(mut self, name: &str, body: &str) -> Self {
        let templates = self
            .fields
            .entry("resource_templates")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = templates {
            map.insert(name.to_string(), Value::from(body));
        }
        self
    }

    pub fn build(self) -> MappingRecord {
        MappingRecord::new(self.name, self.fields)
    }
}

/// Converts a `json!` map literal into a `Map`.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a map, got {}", other),
    }
}
