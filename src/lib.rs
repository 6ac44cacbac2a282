//! Layered Render - template inheritance on a flat template engine
//!
//! Templates in a directory may extend a base layout, override its named
//! blocks, include other files literally and call other files as
//! fragments:
//!
//! ```text
//! base.html:  {{ define "title" }}Base{{ end }}<h1>{{ template "title" }}</h1>
//! child.html: {{ extends "base.html" }}{{ define "title" }}Child{{ end }}
//! ```
//!
//! Every leaf file is composed with its ancestors into one unit and stored
//! in a [`TemplateRegistry`] under its path relative to the base directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use layered_render::{execute_by_name, load_all};
//!
//! let registry = load_all("templates").unwrap();
//! let mut out = Vec::new();
//! execute_by_name(&registry, "child.html", &(), &mut out).unwrap();
//! assert_eq!(out, b"<h1>Child</h1>");
//! ```

pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod renderer;

pub use compose::{compose_template, ComposedTemplate};
pub use config::{ConfigError, FailurePolicy, LoaderConfig};
pub use engine::{EscapeMode, ExecError, FuncError, FuncMap};
pub use error::{ParseError, TemplateError};
pub use registry::{LoadFailure, TemplateRegistry};
pub use renderer::Renderer;

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when rendering a registered template
#[derive(Debug, Error)]
pub enum RenderError {
    /// No template is registered under the name
    #[error("template not found: {name}")]
    NotFound { name: String },

    /// Error during template execution
    #[error("render error: {0}")]
    Exec(#[from] ExecError),

    /// Render data could not be converted to a template value
    #[error("invalid render data: {0}")]
    Data(#[from] serde_json::Error),

    /// Writing the rendered output failed
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Load and compose every template below `base`
pub fn load_all(base: impl AsRef<Path>) -> Result<TemplateRegistry, TemplateError> {
    load_all_with_config(base, &FuncMap::new(), &LoaderConfig::default())
}

/// Load and compose every template below `base` with extra template functions
pub fn load_all_with_functions(
    base: impl AsRef<Path>,
    funcs: &FuncMap,
) -> Result<TemplateRegistry, TemplateError> {
    load_all_with_config(base, funcs, &LoaderConfig::default())
}

/// Load and compose every template below `base` with explicit configuration
pub fn load_all_with_config(
    base: impl AsRef<Path>,
    funcs: &FuncMap,
    config: &LoaderConfig,
) -> Result<TemplateRegistry, TemplateError> {
    registry::load(base.as_ref(), funcs, config)
}

/// Render the template registered as `name` with `data` into `sink`
///
/// Output is rendered into a scratch buffer first and written to `sink`
/// only on success, so a failed render never leaves partial output.
pub fn execute_by_name<T, W>(
    registry: &TemplateRegistry,
    name: &str,
    data: &T,
    sink: &mut W,
) -> Result<(), RenderError>
where
    T: Serialize + ?Sized,
    W: Write + ?Sized,
{
    let template = registry.get(name).ok_or_else(|| RenderError::NotFound {
        name: name.to_string(),
    })?;
    let data = serde_json::to_value(data)?;

    let mut buf = String::new();
    template.execute(&data, &mut buf)?;
    sink.write_all(buf.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_unknown_name_writes_nothing() {
        let registry = TemplateRegistry::new();
        let mut out = Vec::new();
        let err = execute_by_name(&registry, "nope.html", &(), &mut out).unwrap_err();
        assert!(matches!(err, RenderError::NotFound { ref name } if name == "nope.html"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_failed_render_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.html"), "partial {{ .A.B }}").unwrap();
        let registry = load_all(dir.path()).unwrap();

        let mut out = Vec::new();
        let err = execute_by_name(&registry, "a.html", &serde_json::json!({"A": 1}), &mut out)
            .unwrap_err();
        assert!(matches!(err, RenderError::Exec(ExecError::Field { .. })));
        assert!(out.is_empty());
    }
}
