//! Abstract syntax tree for parsed template source

use serde_json::Value;

use crate::error::Span;

/// A parsed template body
pub type Nodes = Vec<Node>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, emitted as-is
    Text(String),
    /// `{{ pipeline }}`, or a declaration `{{ $x := pipeline }}` which emits nothing
    Output(Pipeline),
    /// `{{ template "name" [pipeline] }}`
    Template {
        name: String,
        pipeline: Option<Pipeline>,
    },
    /// `{{ if }} ... {{ else if }} ... {{ else }} ... {{ end }}`
    If {
        cond: Pipeline,
        then: Nodes,
        otherwise: Nodes,
    },
    /// `{{ range [$i, $e :=] pipeline }} ... {{ else }} ... {{ end }}`
    Range {
        pipeline: Pipeline,
        body: Nodes,
        otherwise: Nodes,
    },
    /// `{{ with pipeline }} ... {{ else }} ... {{ end }}`
    With {
        pipeline: Pipeline,
        body: Nodes,
        otherwise: Nodes,
    },
}

/// Top-level item of a parsed unit; `define` is only legal at the top level
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(Node),
    Define { name: String, body: Nodes },
}

/// Commands joined by `|`, optionally declaring variables
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub decls: Vec<String>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Function call; the previous pipeline stage is appended as the last argument
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// A bare operand
    Value(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `.`
    Dot,
    /// `.A.B`
    Field(Vec<String>),
    /// `$x.A.B`
    Variable { name: String, fields: Vec<String> },
    Literal(Value),
    /// Niladic function used as an argument
    Func { name: String, span: Span },
    /// `(pipeline).A.B`
    Group {
        pipeline: Box<Pipeline>,
        fields: Vec<String>,
    },
}

/// Function references found while walking the tree: name and call-site span
pub type FunctionRefs<'a> = Vec<(&'a str, &'a Span)>;

impl Pipeline {
    /// Collect every function name referenced by this pipeline
    pub fn collect_functions<'a>(&'a self, out: &mut FunctionRefs<'a>) {
        for cmd in &self.commands {
            match cmd {
                Command::Call { name, args, span } => {
                    out.push((name.as_str(), span));
                    args.iter().for_each(|a| a.collect_functions(out));
                }
                Command::Value(expr) => expr.collect_functions(out),
            }
        }
    }
}

impl Expr {
    fn collect_functions<'a>(&'a self, out: &mut FunctionRefs<'a>) {
        match self {
            Expr::Func { name, span } => out.push((name.as_str(), span)),
            Expr::Group { pipeline, .. } => pipeline.collect_functions(out),
            _ => {}
        }
    }
}

impl Node {
    pub fn collect_functions<'a>(&'a self, out: &mut FunctionRefs<'a>) {
        match self {
            Node::Text(_) => {}
            Node::Output(p) => p.collect_functions(out),
            Node::Template { pipeline, .. } => {
                if let Some(p) = pipeline {
                    p.collect_functions(out);
                }
            }
            Node::If {
                cond: pipeline,
                then: body,
                otherwise,
            }
            | Node::Range {
                pipeline,
                body,
                otherwise,
            }
            | Node::With {
                pipeline,
                body,
                otherwise,
            } => {
                pipeline.collect_functions(out);
                for node in body.iter().chain(otherwise) {
                    node.collect_functions(out);
                }
            }
        }
    }
}
