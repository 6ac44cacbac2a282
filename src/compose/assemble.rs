//! Template assembly: parse a rewritten stack into one template set

use serde_json::Value;
use tracing::debug;

use super::chain::ResolvedChain;
use super::overrides::BlockBindings;
use super::stack::SourceUnit;
use crate::config::LoaderConfig;
use crate::engine::{ExecError, FuncMap, TemplateSet};
use crate::error::TemplateError;

/// A leaf file composed with its ancestors, includes and fragments
#[derive(Debug, Clone)]
pub struct ComposedTemplate {
    name: String,
    entry: String,
    units: Vec<SourceUnit>,
    bindings: BlockBindings,
    set: TemplateSet,
}

impl ComposedTemplate {
    /// Logical name of the leaf file
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit execution starts from
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Rewritten source of every unit, in parse order
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn unit(&self, name: &str) -> Option<&SourceUnit> {
        self.units.iter().find(|u| u.name() == name)
    }

    pub fn bindings(&self) -> &BlockBindings {
        &self.bindings
    }

    /// Render with `data` as dot, appending to `out`
    pub fn execute(&self, data: &Value, out: &mut String) -> Result<(), ExecError> {
        self.set.execute(&self.entry, data, out)
    }
}

/// Parse every unit of `chain` into a shared namespace
///
/// Units are parsed in stack order with `funcs` visible before parsing. The
/// first unit that fails to parse aborts assembly.
pub fn assemble(
    name: &str,
    chain: ResolvedChain,
    bindings: BlockBindings,
    funcs: &FuncMap,
    config: &LoaderConfig,
) -> Result<ComposedTemplate, TemplateError> {
    let mut set = TemplateSet::new()
        .with_functions(funcs)
        .with_escape(config.escape)
        .with_max_depth(config.max_depth);

    for unit in &chain.stack {
        set.parse(unit.name(), &unit.body)
            .map_err(|error| TemplateError::ParseFailure {
                unit: unit.name().to_string(),
                source_text: unit.body.clone(),
                error,
            })?;
    }

    debug!(
        template = %name,
        entry = %chain.entry,
        units = chain.stack.len(),
        blocks = bindings.len(),
        "assembled template"
    );

    Ok(ComposedTemplate {
        name: name.to_string(),
        entry: chain.entry,
        units: chain.stack.into_units(),
        bindings,
        set,
    })
}
