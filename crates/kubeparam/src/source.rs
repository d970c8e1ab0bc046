//! Contracts for the external parameter/template store.
//!
//! The store itself (HTTP client, credentials, caching) lives with the driver.
//! Templates only need to list and fetch named template bodies for a project.

use thiserror::Error;

/// Errors raised by a template source. They reach callers unwrapped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Template source unavailable: {0}")]
    Unavailable(String),
}

/// Lookup of named template bodies, scoped by project.
pub trait TemplateSource: Send + Sync {
    /// Names of every template visible to `project`.
    fn template_names(&self, project: &str) -> Result<Vec<String>, SourceError>;

    /// Current body of the template `name` for `project`.
    fn template(&self, name: &str, project: &str) -> Result<String, SourceError>;
}
