//! Template composition: inheritance and inclusion on a flat engine
//!
//! A leaf file is composed in three stages:
//!
//! 1. [`resolve_chain`] reads the leaf, its `extends` ancestors and any
//!    files it references through `template "<file>"`, inlining `include`
//!    directives along the way.
//! 2. [`resolve_overrides`] renames every `define` and points each block
//!    call at the most specific definition.
//! 3. [`assemble`] parses the rewritten units into one engine namespace.

pub mod assemble;
pub mod chain;
pub mod include;
pub mod overrides;
pub mod reader;
pub mod scanner;
pub mod stack;

pub use assemble::{assemble, ComposedTemplate};
pub use chain::{resolve_chain, ResolutionContext, ResolvedChain};
pub use include::inline_includes;
pub use overrides::{resolve_overrides, BlockBindings};
pub use reader::{logical_name, FsReader, MemoryReader, SourceReader};
pub use scanner::{Directive, DirectiveKind};
pub use stack::{CompositionStack, SourceUnit};

use crate::config::LoaderConfig;
use crate::engine::FuncMap;
use crate::error::TemplateError;

/// Compose the leaf file `leaf` into a ready-to-render template
pub fn compose_template(
    leaf: &str,
    reader: &dyn SourceReader,
    funcs: &FuncMap,
    config: &LoaderConfig,
) -> Result<ComposedTemplate, TemplateError> {
    let name = logical_name(leaf);
    let mut chain = resolve_chain(&name, reader, config)?;
    let bindings = resolve_overrides(&mut chain.stack, config);
    assemble(&name, chain, bindings, funcs, config)
}
