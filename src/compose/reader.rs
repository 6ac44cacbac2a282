//! Source reading and logical template names

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::TemplateError;

/// Supplies raw template text by logical name
pub trait SourceReader {
    /// Read the named source; zero-length content is an error
    fn read(&self, name: &str) -> Result<String, TemplateError>;
}

/// Reads templates from files below a base directory
#[derive(Debug, Clone)]
pub struct FsReader {
    base: PathBuf,
}

impl FsReader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Filesystem path of a logical name
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

impl SourceReader for FsReader {
    fn read(&self, name: &str) -> Result<String, TemplateError> {
        let content = std::fs::read_to_string(self.path_of(name)).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                TemplateError::not_found(name)
            } else {
                TemplateError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })?;
        non_empty(name, content)
    }
}

/// In-memory sources keyed by logical name
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<String, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, body: impl Into<String>) {
        self.files.insert(logical_name(name), body.into());
    }

    /// Builder form of [`MemoryReader::insert`]
    pub fn with_file(mut self, name: &str, body: impl Into<String>) -> Self {
        self.insert(name, body);
        self
    }
}

impl SourceReader for MemoryReader {
    fn read(&self, name: &str) -> Result<String, TemplateError> {
        let content = self
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::not_found(name))?;
        non_empty(name, content)
    }
}

fn non_empty(name: &str, content: String) -> Result<String, TemplateError> {
    if content.is_empty() {
        return Err(TemplateError::Empty {
            name: name.to_string(),
        });
    }
    Ok(content)
}

/// Normalize a template reference to its registry key
///
/// Separators become `/`, empty and `.` segments are dropped and `..`
/// folds into its parent, so `.\partials\nav.html`,
/// `pages/../partials/nav.html` and `partials/nav.html` name the same file.
/// A `..` with no parent left to fold into is kept at the front.
pub fn logical_name(reference: &str) -> String {
    let normalized = reference.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." if segments.last().is_some_and(|last| *last != "..") => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Logical name of `path` relative to `base`, if it lies below it
pub fn relative_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(logical_name(&parts.join("/")))
}
