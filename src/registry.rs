//! Template registry and the directory load pass

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::compose::reader::relative_name;
use crate::compose::{compose_template, ComposedTemplate, FsReader};
use crate::config::{FailurePolicy, LoaderConfig};
use crate::engine::FuncMap;
use crate::error::TemplateError;

/// A leaf file left out of the registry under [`FailurePolicy::Skip`]
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub name: String,
    pub error: Arc<TemplateError>,
}

/// Composed templates keyed by logical name
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<ComposedTemplate>>,
    failures: Vec<LoadFailure>,
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its own name, replacing any previous entry
    pub fn insert(&mut self, template: ComposedTemplate) {
        self.templates
            .insert(template.name().to_string(), Arc::new(template));
    }

    /// Get a template by logical name
    pub fn get(&self, name: &str) -> Option<&Arc<ComposedTemplate>> {
        self.templates.get(name)
    }

    /// Check if a template exists
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Files skipped during loading
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Copy every entry of `other` into this registry; `other` wins on conflicts
    pub fn merge(&mut self, other: &TemplateRegistry) {
        for (name, template) in &other.templates {
            self.templates.insert(name.clone(), Arc::clone(template));
        }
        self.failures
            .retain(|f| !other.templates.contains_key(&f.name));
        self.failures.extend(other.failures.iter().cloned());
    }
}

/// Compose every leaf file below `base` into a new registry
///
/// Files are visited in sorted path order. Unreadable directory entries are
/// skipped; a file that fails to compose aborts the load or is recorded in
/// [`TemplateRegistry::failures`], depending on the failure policy.
pub fn load(
    base: &Path,
    funcs: &FuncMap,
    config: &LoaderConfig,
) -> Result<TemplateRegistry, TemplateError> {
    if !base.is_dir() {
        return Err(TemplateError::not_found(base.display().to_string()));
    }

    let reader = FsReader::new(base);
    let mut registry = TemplateRegistry::new();

    let walker = WalkDir::new(base).follow_links(true).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = relative_name(base, entry.path()) else {
            continue;
        };
        if !name.ends_with(&config.suffix) {
            continue;
        }

        match compose_template(&name, &reader, funcs, config) {
            Ok(template) => {
                debug!(template = %name, units = template.units().len(), "registered template");
                registry.insert(template);
            }
            Err(error) => match config.failure_policy {
                FailurePolicy::Abort => return Err(error),
                FailurePolicy::Skip => {
                    warn!(template = %name, error = %error, "skipping template");
                    registry.failures.push(LoadFailure {
                        name,
                        error: Arc::new(error),
                    });
                }
            },
        }
    }

    info!(
        base = %base.display(),
        templates = registry.len(),
        failed = registry.failures.len(),
        "loaded templates"
    );
    Ok(registry)
}
