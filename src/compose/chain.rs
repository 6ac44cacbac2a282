//! Extends chain resolution
//!
//! Walks `extends` directives from a leaf up to its root ancestor and builds
//! the composition stack root-first. Files referenced by path-shaped
//! `template` calls are resolved the same way and land in the stack before
//! the unit that references them.

use std::collections::HashSet;

use tracing::debug;

use super::include::inline_nested;
use super::reader::{logical_name, SourceReader};
use super::scanner::{self, DirectiveKind};
use super::stack::{CompositionStack, SourceUnit};
use crate::config::LoaderConfig;
use crate::error::TemplateError;

/// Result of resolving one leaf file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChain {
    /// Every unit the leaf needs, general to specific
    pub stack: CompositionStack,
    /// Root of the leaf's own `extends` chain; rendering starts here
    pub entry: String,
}

/// Request-local state for resolving one leaf file
pub struct ResolutionContext<'r> {
    reader: &'r dyn SourceReader,
    config: &'r LoaderConfig,
    /// Files whose resolution is in progress, outermost first
    resolving: Vec<String>,
    stack: CompositionStack,
    /// Names already on the stack
    resolved: HashSet<String>,
    /// First unit reached that extends nothing
    entry: Option<String>,
}

impl<'r> ResolutionContext<'r> {
    pub fn new(reader: &'r dyn SourceReader, config: &'r LoaderConfig) -> Self {
        Self {
            reader,
            config,
            resolving: Vec::new(),
            stack: CompositionStack::new(),
            resolved: HashSet::new(),
            entry: None,
        }
    }

    /// Check if a file is currently being resolved (cycle detection)
    pub fn is_resolving(&self, name: &str) -> bool {
        self.resolving.iter().any(|n| n == name)
    }

    fn start_resolving(&mut self, name: &str) {
        self.resolving.push(name.to_string());
    }

    fn done_resolving(&mut self) {
        self.resolving.pop();
    }

    /// Resolve `name` and everything it depends on onto the stack
    pub fn add(&mut self, name: &str) -> Result<(), TemplateError> {
        if self.resolved.contains(name) {
            return Ok(());
        }
        if self.is_resolving(name) {
            let start = self
                .resolving
                .iter()
                .position(|n| n == name)
                .unwrap_or_default();
            let mut chain = self.resolving[start..].to_vec();
            chain.push(name.to_string());
            return Err(TemplateError::cycle(chain));
        }

        let source = self.reader.read(name)?;
        self.start_resolving(name);
        let result = self.add_unit(name, &source);
        self.done_resolving();
        result
    }

    fn add_unit(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        let extends = scanner::find_all(source, DirectiveKind::Extends);

        // Only the first extends selects the parent. Parents resolve before
        // anything else, so the first unit without one is the leaf's root.
        match extends.first() {
            Some(directive) => {
                let parent = logical_name(&directive.argument);
                debug!(template = %name, parent = %parent, "resolving parent");
                self.add(&parent)?;
            }
            None => {
                self.entry.get_or_insert_with(|| name.to_string());
            }
        }

        let stripped = scanner::splice(
            source,
            extends.iter().map(|d| (d.span.clone(), d.erase())),
        );
        let body = inline_nested(&stripped, self.reader, &mut vec![name.to_string()])?;

        for directive in scanner::find_all(&body, DirectiveKind::Invoke) {
            if !self.config.is_file_reference(&directive.argument) {
                continue;
            }
            let dependency = logical_name(&directive.argument);
            // A file still in progress is already headed for the stack
            if self.is_resolving(&dependency) {
                continue;
            }
            self.add(&dependency)?;
        }

        debug!(template = %name, position = self.stack.len(), "unit resolved");
        self.stack.push(SourceUnit::new(name, body));
        self.resolved.insert(name.to_string());
        Ok(())
    }

    /// Root of the first extends chain resolved, if any unit was added
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn into_stack(self) -> CompositionStack {
        self.stack
    }
}

/// Resolve the composition stack for the leaf file `leaf`
pub fn resolve_chain(
    leaf: &str,
    reader: &dyn SourceReader,
    config: &LoaderConfig,
) -> Result<ResolvedChain, TemplateError> {
    let leaf = logical_name(leaf);
    let mut ctx = ResolutionContext::new(reader, config);
    ctx.add(&leaf)?;
    let entry = ctx.entry().unwrap_or(&leaf).to_string();
    Ok(ResolvedChain {
        stack: ctx.into_stack(),
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::reader::MemoryReader;
    use pretty_assertions::assert_eq;

    fn resolve(reader: &MemoryReader, leaf: &str) -> Result<ResolvedChain, TemplateError> {
        resolve_chain(leaf, reader, &LoaderConfig::default())
    }

    #[test]
    fn test_single_file() {
        let reader = MemoryReader::new().with_file("page.html", "hello");
        let chain = resolve(&reader, "page.html").unwrap();
        assert_eq!(chain.stack.names(), vec!["page.html"]);
        assert_eq!(chain.entry, "page.html");
    }

    #[test]
    fn test_three_level_chain_is_root_first() {
        let reader = MemoryReader::new()
            .with_file("a.html", "A")
            .with_file("b.html", r#"{{ extends "a.html" }}B"#)
            .with_file("c.html", r#"{{ extends "b.html" }}C"#);
        let chain = resolve(&reader, "c.html").unwrap();
        assert_eq!(chain.stack.names(), vec!["a.html", "b.html", "c.html"]);
        assert_eq!(chain.entry, "a.html");
        assert_eq!(chain.stack.get("c.html").unwrap().body, "C");
    }

    #[test]
    fn test_only_first_extends_counts_but_all_are_stripped() {
        let reader = MemoryReader::new()
            .with_file("a.html", "A")
            .with_file("b.html", "B")
            .with_file("leaf.html", r#"{{ extends "a.html" }}{{ extends "b.html" }}L"#);
        let chain = resolve(&reader, "leaf.html").unwrap();
        assert_eq!(chain.stack.names(), vec!["a.html", "leaf.html"]);
        assert_eq!(chain.stack.get("leaf.html").unwrap().body, "L");
    }

    #[test]
    fn test_includes_are_inlined_per_unit() {
        let reader = MemoryReader::new()
            .with_file("nav.html", "<nav/>")
            .with_file("page.html", r#"{{ include "nav.html" }}body"#);
        let chain = resolve(&reader, "page.html").unwrap();
        assert_eq!(chain.stack.get("page.html").unwrap().body, "<nav/>body");
    }

    #[test]
    fn test_file_references_precede_the_referencing_unit() {
        let reader = MemoryReader::new()
            .with_file("base.html", r#"{{ template "frag.html" . }}"#)
            .with_file("frag.html", "F")
            .with_file("page.html", r#"{{ extends "base.html" }}"#);
        let chain = resolve(&reader, "page.html").unwrap();
        assert_eq!(
            chain.stack.names(),
            vec!["frag.html", "base.html", "page.html"]
        );
        assert_eq!(chain.entry, "base.html");
    }

    #[test]
    fn test_diamond_dependency_is_deduplicated() {
        let reader = MemoryReader::new()
            .with_file("a.html", "A")
            .with_file("f.html", "F")
            .with_file("b.html", r#"{{ extends "a.html" }}{{ template "f.html" }}"#)
            .with_file("c.html", r#"{{ extends "a.html" }}{{ template "f.html" }}{{ template "b.html" }}"#);
        let chain = resolve(&reader, "c.html").unwrap();
        let names = chain.stack.names();
        assert_eq!(names.iter().filter(|n| **n == "f.html").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "a.html").count(), 1);
        assert_eq!(names.last(), Some(&"c.html"));
    }

    #[test]
    fn test_equivalent_paths_are_deduplicated() {
        let reader = MemoryReader::new()
            .with_file("f.html", r#"{{ define "x" }}X{{ end }}F"#)
            .with_file("base.html", "B")
            .with_file(
                "p.html",
                r#"{{ extends "./sub/../base.html" }}{{ template "f.html" }}{{ template "sub/../f.html" }}{{ template "./f.html" }}"#,
            );
        let chain = resolve(&reader, "p.html").unwrap();
        assert_eq!(chain.stack.names(), vec!["base.html", "f.html", "p.html"]);
        assert_eq!(chain.entry, "base.html");
    }

    #[test]
    fn test_entry_ignores_fragment_chains() {
        let reader = MemoryReader::new()
            .with_file("layout.html", r#"{{ template "card.html" . }}"#)
            .with_file("panel.html", "P")
            .with_file("card.html", r#"{{ extends "panel.html" }}"#)
            .with_file("page.html", r#"{{ extends "layout.html" }}"#);
        let chain = resolve(&reader, "page.html").unwrap();
        assert_eq!(chain.entry, "layout.html");
        assert_eq!(
            chain.stack.names(),
            vec!["panel.html", "card.html", "layout.html", "page.html"]
        );
    }

    #[test]
    fn test_extends_cycle() {
        let reader = MemoryReader::new()
            .with_file("a.html", r#"{{ extends "b.html" }}"#)
            .with_file("b.html", r#"{{ extends "a.html" }}"#);
        match resolve(&reader, "a.html").unwrap_err() {
            TemplateError::CycleDetected { chain } => {
                assert_eq!(chain, vec!["a.html", "b.html", "a.html"])
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_by_file_is_not_a_cycle() {
        let reader = MemoryReader::new().with_file(
            "tree.html",
            r#"{{ range .Children }}{{ template "tree.html" . }}{{ end }}"#,
        );
        let chain = resolve(&reader, "tree.html").unwrap();
        assert_eq!(chain.stack.names(), vec!["tree.html"]);
    }

    #[test]
    fn test_missing_parent() {
        let reader = MemoryReader::new().with_file("leaf.html", r#"{{ extends "gone.html" }}"#);
        assert!(matches!(
            resolve(&reader, "leaf.html"),
            Err(TemplateError::NotFound { ref name }) if name == "gone.html"
        ));
    }
}
