//! In-memory template store.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use kubeparam::source::{SourceError, TemplateSource};

/// Templates for a single project. Counts body fetches.
pub struct FakeTemplateSource {
    project: String,
    templates: BTreeMap<String, String>,
    fetches: AtomicUsize,
}

impl FakeTemplateSource {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            templates: BTreeMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_template(mut self, name: &str, body: &str) -> Self {
        self.templates.insert(name.to_string(), body.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_project(&self, project: &str) -> Result<(), SourceError> {
        if project == self.project {
            Ok(())
        } else {
            Err(SourceError::UnknownProject(project.to_string()))
        }
    }
}

impl TemplateSource for FakeTemplateSource {
    fn template_names(&self, project: &str) -> Result<Vec<String>, SourceError> {
        self.check_project(project)?;
        Ok(self.templates.keys().cloned().collect())
    }

    fn template(&self, name: &str, project: &str) -> Result<String, SourceError> {
        self.check_project(project)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownTemplate(name.to_string()))
    }
}
