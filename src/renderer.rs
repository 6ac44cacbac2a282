//! Long-lived renderer with build-then-swap reloads

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::info;

use crate::config::LoaderConfig;
use crate::engine::FuncMap;
use crate::error::TemplateError;
use crate::registry::{self, TemplateRegistry};
use crate::{execute_by_name, RenderError};

/// Loads template directories and renders templates by logical name
///
/// Readers always see a complete registry: loads and reloads build a new
/// registry off to the side and swap it in whole.
#[derive(Debug, Default)]
pub struct Renderer {
    funcs: FuncMap,
    config: LoaderConfig,
    /// Loaded directories, in load order; also serializes registry updates
    directories: Mutex<Vec<PathBuf>>,
    registry: RwLock<Arc<TemplateRegistry>>,
}

impl Renderer {
    /// Create a renderer with no templates, builtin functions only
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the functions injected into every template
    pub fn with_functions(mut self, funcs: FuncMap) -> Self {
        self.funcs = funcs;
        self
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load every template below `path` into the registry
    ///
    /// Names already registered from an earlier directory are replaced. On
    /// error the current registry is left untouched.
    pub fn load_directory(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let path = path.as_ref();
        let loaded = registry::load(path, &self.funcs, &self.config)?;

        let mut directories = self.directories.lock();
        let mut next = TemplateRegistry::clone(&**self.registry.read());
        next.merge(&loaded);
        *self.registry.write() = Arc::new(next);

        if !directories.iter().any(|d| d == path) {
            directories.push(path.to_path_buf());
        }
        Ok(())
    }

    /// Rebuild the registry from every loaded directory
    ///
    /// The new registry replaces the old one only if every directory loads.
    pub fn reload(&self) -> Result<(), TemplateError> {
        let directories = self.directories.lock();
        let mut next = TemplateRegistry::new();
        for dir in directories.iter() {
            next.merge(&registry::load(dir, &self.funcs, &self.config)?);
        }
        info!(
            directories = directories.len(),
            templates = next.len(),
            "reloaded templates"
        );
        *self.registry.write() = Arc::new(next);
        Ok(())
    }

    /// Snapshot of the current registry
    pub fn registry(&self) -> Arc<TemplateRegistry> {
        Arc::clone(&*self.registry.read())
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        self.directories.lock().clone()
    }

    /// Render the template `name` into `sink`; nothing is written on failure
    pub fn execute<T, W>(&self, name: &str, data: &T, sink: &mut W) -> Result<(), RenderError>
    where
        T: Serialize + ?Sized,
        W: Write + ?Sized,
    {
        execute_by_name(&self.registry(), name, data, sink)
    }
}
