//! Per-project spec resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, info_span, warn};

use super::merge::{deep_merge, overlay};
use super::resource::{MappingRecord, MappingScope};
use super::spec::{default_fields, ProjectSpec};
use super::validation::MappingValidator;
use crate::error::ConfigError;

#[derive(Debug)]
struct LoadedSpecs {
    root: Arc<ProjectSpec>,
    overrides: Vec<Arc<ProjectSpec>>,
}

/// The set of mappings for one poll cycle.
///
/// Specs are built once, on first use. Resolutions are cached per project
/// name for the lifetime of the `Config`; re-reading mappings means building
/// a new `Config`.
#[derive(Debug)]
pub struct Config {
    mappings: Vec<MappingRecord>,
    loaded: OnceLock<LoadedSpecs>,
    resolved: Mutex<HashMap<String, Arc<ProjectSpec>>>,
}

impl Config {
    pub fn new(mappings: Vec<MappingRecord>) -> Self {
        Self {
            mappings,
            loaded: OnceLock::new(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn mappings(&self) -> &[MappingRecord] {
        &self.mappings
    }

    /// Validates the mappings and builds every spec. Idempotent.
    pub fn load(&self) -> Result<(), ConfigError> {
        self.loaded().map(|_| ())
    }

    fn loaded(&self) -> Result<&LoadedSpecs, ConfigError> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }
        let specs = self.build()?;
        Ok(self.loaded.get_or_init(|| specs))
    }

    fn build(&self) -> Result<LoadedSpecs, ConfigError> {
        let _span = info_span!("config_load", mappings = self.mappings.len()).entered();

        let validator = MappingValidator::new()?;
        let mut roots = Vec::new();
        let mut overrides = Vec::new();
        for record in &self.mappings {
            validator.validate(record)?;
            match record.scope()? {
                MappingScope::Root => roots.push(record),
                MappingScope::Override => overrides.push(record),
            }
        }

        if roots.len() > 1 {
            return Err(ConfigError::MultipleRoots {
                names: roots.iter().map(|r| r.name.clone()).collect(),
            });
        }

        let base: Map<String, Value> = match roots.first() {
            Some(root) => overlay(&default_fields(), &root.named_fields()),
            None => default_fields(),
        };
        let root = Arc::new(ProjectSpec::from_fields(&base)?);
        debug!(spec = %root, "Loaded root spec");

        let mut override_specs = Vec::with_capacity(overrides.len());
        for record in overrides {
            let mut fields = deep_merge(&base, &record.named_fields());
            fields.insert(
                "scope".to_string(),
                Value::from(MappingScope::Override.as_str()),
            );
            let spec = ProjectSpec::from_fields(&fields)?;
            debug!(spec = %spec, "Loaded override spec");
            override_specs.push(Arc::new(spec));
        }

        Ok(LoadedSpecs {
            root,
            overrides: override_specs,
        })
    }

    pub fn root_spec(&self) -> Result<Arc<ProjectSpec>, ConfigError> {
        Ok(self.loaded()?.root.clone())
    }

    pub fn override_specs(&self) -> Result<Vec<Arc<ProjectSpec>>, ConfigError> {
        Ok(self.loaded()?.overrides.clone())
    }

    /// The spec governing `project`: the single override whose selector
    /// matches, or the root spec when none does. More than one matching
    /// override is an error.
    pub fn resolve(&self, project: &str) -> Result<Arc<ProjectSpec>, ConfigError> {
        let loaded = self.loaded()?;

        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(spec) = resolved.get(project) {
            return Ok(spec.clone());
        }

        let _span = info_span!("config_resolve", project).entered();
        let matching: Vec<&Arc<ProjectSpec>> = loaded
            .overrides
            .iter()
            .filter(|spec| spec.selects_project(project))
            .collect();

        let spec = match matching.as_slice() {
            [] => {
                debug!(project, "Using root spec");
                loaded.root.clone()
            }
            [only] => {
                debug!(project, spec = %only.name, "Using override spec");
                Arc::clone(only)
            }
            _ => {
                let matches: Vec<String> = matching.iter().map(|spec| spec.selector_label()).collect();
                warn!(project, matches = %matches.join(", "), "Ambiguous override selection");
                return Err(ConfigError::AmbiguousSelection {
                    project: project.to_string(),
                    matches,
                });
            }
        };

        resolved.insert(project.to_string(), spec.clone());
        Ok(spec)
    }
}
