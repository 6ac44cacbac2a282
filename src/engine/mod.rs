//! Flat template engine
//!
//! A Go-template style engine: named templates live in one flat
//! [`TemplateSet`] namespace and may call each other with
//! `{{ template "name" pipeline }}`. It has no notion of inheritance or
//! block overriding; that is layered on top by [`crate::compose`].
//!
//! ```text
//! {{ define "row" }}<li>{{ .Name | printf "%s!" }}</li>{{ end }}
//! <ul>{{ range .Items }}{{ template "row" . }}{{ else }}<li>none</li>{{ end }}</ul>
//! ```

pub mod ast;
mod exec;
mod funcs;
mod grammar;
pub mod lexer;
mod value;

pub use exec::{EscapeMode, ExecError, TemplateSet, DEFAULT_MAX_DEPTH, MAX_RANGE_COUNT};
pub use funcs::{builtins, FuncError, FuncMap, Function};
pub use grammar::parse;
pub use value::{display, escape_html, is_truthy};
