//! Block override resolution
//!
//! The engine keeps a single flat namespace, so overriding is done by
//! renaming: every `define` gets a unique identifier, the most specific
//! definition of each block name wins the binding, and block calls are
//! pointed at the winner.

use std::collections::HashMap;

use tracing::debug;

use super::reader::logical_name;
use super::scanner::{self, DirectiveKind};
use super::stack::CompositionStack;
use crate::config::LoaderConfig;

/// Prefix of the unique identifiers given to block definitions
pub const BLOCK_PREFIX: &str = "__block_";

/// Winning unique identifier per original block name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBindings {
    bindings: HashMap<String, String>,
    definitions: usize,
}

impl BlockBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier and bind `block` to it
    fn define(&mut self, block: &str) -> (String, Option<String>) {
        let id = format!("{}{}", BLOCK_PREFIX, self.definitions);
        self.definitions += 1;
        let previous = self.bindings.insert(block.to_string(), id.clone());
        (id, previous)
    }

    /// The identifier a call to `block` resolves to
    pub fn get(&self, block: &str) -> Option<&str> {
        self.bindings.get(block).map(String::as_str)
    }

    /// Number of distinct block names
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Total `define` occurrences renamed, overridden ones included
    pub fn definitions(&self) -> usize {
        self.definitions
    }

    /// Bindings sorted by block name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .bindings
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs.into_iter()
    }
}

/// Rename block definitions and rewire block calls across `stack`
///
/// Pass one renames every `define` in stack order, so a later (more
/// specific) definition overwrites the binding of an earlier one. Pass two
/// rewrites calls: bound names point at their winner, unbound names are
/// removed, and file references are normalized to the referenced unit's
/// logical name. A call without a context argument gets `.`.
pub fn resolve_overrides(stack: &mut CompositionStack, config: &LoaderConfig) -> BlockBindings {
    let mut bindings = BlockBindings::new();

    for unit in stack.iter_mut() {
        let defines = scanner::find_all(&unit.body, DirectiveKind::Define);
        if defines.is_empty() {
            continue;
        }
        let mut edits = Vec::with_capacity(defines.len());
        for directive in defines {
            let (id, previous) = bindings.define(&directive.argument);
            if let Some(previous) = previous {
                debug!(
                    unit = %unit.name(),
                    block = %directive.argument,
                    from = %previous,
                    to = %id,
                    "block overridden"
                );
            }
            edits.push((directive.span.clone(), directive.render(&id, None)));
        }
        unit.body = scanner::splice(&unit.body, edits);
    }

    for unit in stack.iter_mut() {
        let calls = scanner::find_all(&unit.body, DirectiveKind::Invoke);
        if calls.is_empty() {
            continue;
        }
        let mut edits = Vec::with_capacity(calls.len());
        for directive in calls {
            let context = directive.context.as_deref().unwrap_or(".");
            let replacement = if config.is_file_reference(&directive.argument) {
                directive.render(&logical_name(&directive.argument), Some(context))
            } else if let Some(id) = bindings.get(&directive.argument) {
                directive.render(id, Some(context))
            } else {
                debug!(unit = %unit.name(), block = %directive.argument, "call to undefined block removed");
                directive.erase()
            };
            edits.push((directive.span.clone(), replacement));
        }
        unit.body = scanner::splice(&unit.body, edits);
    }

    bindings
}
