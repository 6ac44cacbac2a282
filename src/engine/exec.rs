//! Template sets: a flat namespace of parsed templates and their execution

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::ast::{Command, Expr, Item, Node, Nodes, Pipeline};
use super::funcs::{builtins, FuncError, FuncMap};
use super::grammar;
use super::value::{display, escape_html, is_truthy, kind};
use crate::error::ParseError;

/// Default limit on nested `template` invocations
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Largest integer a `range` action iterates over
pub const MAX_RANGE_COUNT: u64 = 1_000_000;

/// How the output of `{{ pipeline }}` actions is escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// Write values verbatim
    None,
    /// Escape `& < > " '` in every action's output
    #[default]
    Html,
}

/// Errors raised while executing a template
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no such template \"{name}\"")]
    NoSuchTemplate { name: String },

    #[error("template {template}: can't evaluate field {field} in type {kind}")]
    Field {
        template: String,
        field: String,
        kind: &'static str,
    },

    #[error("template {template}: undefined variable {name}")]
    UndefinedVariable { template: String, name: String },

    #[error("template {template}: function \"{name}\" not defined")]
    UndefinedFunction { template: String, name: String },

    #[error("template {template}: error calling {name}: {source}")]
    Call {
        template: String,
        name: String,
        #[source]
        source: FuncError,
    },

    #[error("template {template}: can't give argument to non-function")]
    NotAFunction { template: String },

    #[error("template {template}: range can't iterate over {kind}")]
    Range {
        template: String,
        kind: &'static str,
    },

    #[error("template {template}: range over {count} exceeds the limit of {limit}")]
    RangeLimit {
        template: String,
        count: u64,
        limit: u64,
    },

    #[error("exceeded maximum template depth ({limit})")]
    RecursionLimit { limit: usize },
}

/// A namespace of templates that can invoke each other by name
#[derive(Debug, Clone)]
pub struct TemplateSet {
    trees: HashMap<String, Arc<Nodes>>,
    funcs: FuncMap,
    escape: EscapeMode,
    max_depth: usize,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSet {
    /// Create an empty set with the builtin functions
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            funcs: builtins(),
            escape: EscapeMode::None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Add caller-supplied functions; they override builtins of the same name
    pub fn with_functions(mut self, funcs: &FuncMap) -> Self {
        self.funcs.extend(funcs);
        self
    }

    pub fn with_escape(mut self, escape: EscapeMode) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse `source` as the template `name`
    ///
    /// Top-level `define` blocks become separate templates in this set; a
    /// later definition of a name replaces an earlier one. Every function
    /// the source calls must already be in the set's function map.
    pub fn parse(&mut self, name: &str, source: &str) -> Result<(), ParseError> {
        let items = grammar::parse(source)?;

        let undefined = {
            let mut refs = Vec::new();
            for item in &items {
                match item {
                    Item::Node(node) => node.collect_functions(&mut refs),
                    Item::Define { body, .. } => {
                        body.iter().for_each(|node| node.collect_functions(&mut refs))
                    }
                }
            }
            refs.into_iter()
                .find(|(func, _)| !self.funcs.contains(func))
                .map(|(func, span)| (func.to_string(), span.clone()))
        };
        if let Some((name, span)) = undefined {
            return Err(ParseError::UndefinedFunction { name, span });
        }

        let mut body = Vec::new();
        for item in items {
            match item {
                Item::Define { name, body } => {
                    self.trees.insert(name, Arc::new(body));
                }
                Item::Node(node) => body.push(node),
            }
        }
        self.trees.insert(name.to_string(), Arc::new(body));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(|s| s.as_str())
    }

    /// Execute the template `name` with `data` as dot, appending to `out`
    pub fn execute(&self, name: &str, data: &Value, out: &mut String) -> Result<(), ExecError> {
        let mut state = State {
            set: self,
            template: name,
            vars: Vec::new(),
            depth: 0,
        };
        state.invoke(name, data, out)
    }
}

struct State<'s> {
    set: &'s TemplateSet,
    template: &'s str,
    vars: Vec<(String, Value)>,
    depth: usize,
}

impl<'s> State<'s> {
    fn invoke(&mut self, name: &str, data: &Value, out: &mut String) -> Result<(), ExecError> {
        if self.depth >= self.set.max_depth {
            return Err(ExecError::RecursionLimit {
                limit: self.set.max_depth,
            });
        }
        let set = self.set;
        let (key, nodes) = set
            .trees
            .get_key_value(name)
            .ok_or_else(|| ExecError::NoSuchTemplate {
                name: name.to_string(),
            })?;

        let saved_vars = std::mem::replace(&mut self.vars, vec![("$".to_string(), data.clone())]);
        let saved_template = std::mem::replace(&mut self.template, key.as_str());
        self.depth += 1;

        let result = self.walk(nodes, data, out);

        self.depth -= 1;
        self.template = saved_template;
        self.vars = saved_vars;
        result
    }

    fn walk(&mut self, nodes: &'s [Node], dot: &Value, out: &mut String) -> Result<(), ExecError> {
        for node in nodes {
            self.walk_node(node, dot, out)?;
        }
        Ok(())
    }

    fn walk_node(&mut self, node: &'s Node, dot: &Value, out: &mut String) -> Result<(), ExecError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(pipeline) => {
                let value = self.eval_pipeline(pipeline, dot)?;
                if pipeline.decls.is_empty() {
                    let text = display(&value);
                    match self.set.escape {
                        EscapeMode::Html => out.push_str(&escape_html(&text)),
                        EscapeMode::None => out.push_str(&text),
                    }
                }
            }
            Node::Template { name, pipeline } => {
                let data = match pipeline {
                    Some(p) => self.eval_pipeline(p, dot)?,
                    None => Value::Null,
                };
                self.invoke(name, &data, out)?;
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let mark = self.vars.len();
                let value = self.eval_pipeline(cond, dot)?;
                let branch = if is_truthy(&value) { then } else { otherwise };
                let result = self.walk(branch, dot, out);
                self.vars.truncate(mark);
                result?;
            }
            Node::With {
                pipeline,
                body,
                otherwise,
            } => {
                let mark = self.vars.len();
                let value = self.eval_pipeline(pipeline, dot)?;
                let result = if is_truthy(&value) {
                    self.walk(body, &value, out)
                } else {
                    self.walk(otherwise, dot, out)
                };
                self.vars.truncate(mark);
                result?;
            }
            Node::Range {
                pipeline,
                body,
                otherwise,
            } => self.walk_range(pipeline, body, otherwise, dot, out)?,
        }
        Ok(())
    }

    fn walk_range(
        &mut self,
        pipeline: &'s Pipeline,
        body: &'s [Node],
        otherwise: &'s [Node],
        dot: &Value,
        out: &mut String,
    ) -> Result<(), ExecError> {
        let value = self.eval_commands(&pipeline.commands, dot)?;
        let decls = pipeline.decls.as_slice();

        if let Some(count) = value.as_u64() {
            if count > MAX_RANGE_COUNT {
                return Err(ExecError::RangeLimit {
                    template: self.template.to_string(),
                    count,
                    limit: MAX_RANGE_COUNT,
                });
            }
            if count == 0 {
                return self.walk(otherwise, dot, out);
            }
            for i in 0..count {
                self.range_step(decls, body, Value::from(i), Value::from(i), out)?;
            }
            return Ok(());
        }

        match value {
            Value::Null => self.walk(otherwise, dot, out),
            Value::Array(items) if items.is_empty() => self.walk(otherwise, dot, out),
            Value::Array(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    self.range_step(decls, body, Value::from(i), item, out)?;
                }
                Ok(())
            }
            Value::Object(map) if map.is_empty() => self.walk(otherwise, dot, out),
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (key, item) in entries {
                    self.range_step(decls, body, Value::String(key), item, out)?;
                }
                Ok(())
            }
            other => Err(ExecError::Range {
                template: self.template.to_string(),
                kind: kind(&other),
            }),
        }
    }

    /// Run one iteration of a range body with `$key`/`$elem` bound
    fn range_step(
        &mut self,
        decls: &[String],
        body: &'s [Node],
        key: Value,
        item: Value,
        out: &mut String,
    ) -> Result<(), ExecError> {
        let mark = self.vars.len();
        match decls {
            [elem] => self.vars.push((elem.clone(), item.clone())),
            [index, elem] => {
                self.vars.push((index.clone(), key));
                self.vars.push((elem.clone(), item.clone()));
            }
            _ => {}
        }
        let result = self.walk(body, &item, out);
        self.vars.truncate(mark);
        result
    }

    fn eval_pipeline(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, ExecError> {
        let value = self.eval_commands(&pipeline.commands, dot)?;
        if let Some(name) = pipeline.decls.first() {
            self.vars.push((name.clone(), value.clone()));
        }
        Ok(value)
    }

    fn eval_commands(&mut self, commands: &[Command], dot: &Value) -> Result<Value, ExecError> {
        let mut piped = None;
        for command in commands {
            piped = Some(self.eval_command(command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn eval_command(
        &mut self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, ExecError> {
        match command {
            Command::Call { name, args, .. } => {
                let mut values = args
                    .iter()
                    .map(|arg| self.eval_expr(arg, dot))
                    .collect::<Result<Vec<_>, _>>()?;
                values.extend(piped);
                self.call(name, &values)
            }
            Command::Value(expr) => {
                if piped.is_some() {
                    return Err(ExecError::NotAFunction {
                        template: self.template.to_string(),
                    });
                }
                self.eval_expr(expr, dot)
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, dot: &Value) -> Result<Value, ExecError> {
        match expr {
            Expr::Dot => Ok(dot.clone()),
            Expr::Field(path) => self.fields(dot, path),
            Expr::Variable { name, fields } => {
                let value = self.lookup(name)?;
                self.fields(&value, fields)
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Func { name, .. } => self.call(name, &[]),
            Expr::Group { pipeline, fields } => {
                let value = self.eval_pipeline(pipeline, dot)?;
                self.fields(&value, fields)
            }
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, ExecError> {
        let f = self
            .set
            .funcs
            .get(name)
            .ok_or_else(|| ExecError::UndefinedFunction {
                template: self.template.to_string(),
                name: name.to_string(),
            })?;
        f(args).map_err(|source| ExecError::Call {
            template: self.template.to_string(),
            name: name.to_string(),
            source,
        })
    }

    /// Missing map keys and fields of nil evaluate to nil
    fn fields(&self, value: &Value, path: &[String]) -> Result<Value, ExecError> {
        let mut current = value;
        for field in path {
            current = match current {
                Value::Object(map) => match map.get(field) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                Value::Null => return Ok(Value::Null),
                other => {
                    return Err(ExecError::Field {
                        template: self.template.to_string(),
                        field: field.clone(),
                        kind: kind(other),
                    })
                }
            };
        }
        Ok(current.clone())
    }

    fn lookup(&self, name: &str) -> Result<Value, ExecError> {
        self.vars
            .iter()
            .rev()
            .find(|(var, _)| var == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ExecError::UndefinedVariable {
                template: self.template.to_string(),
                name: name.to_string(),
            })
    }
}
