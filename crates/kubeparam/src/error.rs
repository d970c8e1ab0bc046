use std::path::PathBuf;
use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum KubeparamError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read mapping file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse mapping YAML: {0}")]
    ParseYaml(String),

    #[error("Invalid resource '{name}': {message}")]
    InvalidResource { name: String, message: String },

    #[error("Schema validation failed for mapping '{name}': {errors}")]
    SchemaValidation { name: String, errors: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Multiple root ProjectMappings: {}", names.join(", "))]
    MultipleRoots { names: Vec<String> },

    #[error("Invalid {field} in mapping '{name}': {reason}")]
    InvalidSelector {
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("Invalid resource template '{template}' in mapping '{name}': {source}")]
    InvalidTemplate {
        name: String,
        template: String,
        #[source]
        source: TemplateError,
    },

    #[error("Invalid mapping '{name}': {reason}")]
    InvalidMapping { name: String, reason: String },

    #[error("Multiple configuration specs ({}) match the project '{project}'", matches.join(", "))]
    AmbiguousSelection {
        project: String,
        matches: Vec<String>,
    },
}

impl ConfigError {
    /// Returns true if the error only affects a single project, leaving the
    /// rest of the mapping set usable.
    pub fn is_project_scoped(&self) -> bool {
        matches!(self, ConfigError::AmbiguousSelection { .. })
    }
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Invalid template '{name}': {message}")]
    Compile { name: String, message: String },

    #[error("Template '{name}' failed to render: {message}")]
    Render { name: String, message: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{function} expects {expected}, got {found}")]
    TypeMismatch {
        function: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("Invalid typify parser '{0}'")]
    InvalidParser(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid regex flag '{0}'")]
    InvalidFlag(char),

    #[error("Failed to decode: {0}")]
    Decode(String),

    #[error("Failed to parse: {0}")]
    Parse(String),

    #[error("Failed to serialize: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, KubeparamError>;
