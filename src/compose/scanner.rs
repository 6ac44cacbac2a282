//! Directive scanner
//!
//! Finds the four composition directives in raw template text without
//! parsing the surrounding template language:
//!
//! ```text
//! {{ extends "base.html" }}
//! {{ include "partials/nav.html" }}
//! {{ define "title" }}
//! {{ template "title" .Page }}
//! ```
//!
//! Whitespace inside the braces is optional, arguments may be quoted with
//! `"`, `'` or `` ` `` or left bare, and `{{-` / `-}}` trim markers are
//! recorded so rewrites can keep them.

use std::fmt;

use crate::engine::lexer::find_close;
use crate::error::Span;

/// The directive shapes the composer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Extends,
    Include,
    Define,
    /// `template "name" [ctx]`: a block call or a file reference
    Invoke,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 4] = [
        DirectiveKind::Extends,
        DirectiveKind::Include,
        DirectiveKind::Define,
        DirectiveKind::Invoke,
    ];

    /// Keyword that opens the directive inside `{{ }}`
    pub fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::Extends => "extends",
            DirectiveKind::Include => "include",
            DirectiveKind::Define => "define",
            DirectiveKind::Invoke => "template",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One directive occurrence in a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Byte range of the whole `{{ ... }}` action
    pub span: Span,
    /// Path or block name, unquoted
    pub argument: String,
    /// Anything after the argument, trimmed; `None` when absent
    pub context: Option<String>,
    pub trim_left: bool,
    pub trim_right: bool,
}

impl Directive {
    /// The directive exactly as written
    pub fn raw<'a>(&self, body: &'a str) -> &'a str {
        &body[self.span.clone()]
    }

    /// Re-emit this directive with a new argument and context
    ///
    /// The argument is always written double-quoted; trim markers are kept.
    pub fn render(&self, argument: &str, context: Option<&str>) -> String {
        let mut out = String::from(if self.trim_left { "{{- " } else { "{{ " });
        out.push_str(self.kind.keyword());
        out.push(' ');
        push_quoted(&mut out, argument);
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            out.push(' ');
            out.push_str(ctx);
        }
        out.push_str(if self.trim_right { " -}}" } else { " }}" });
        out
    }

    /// Replacement text that substitutes `text` for the directive
    ///
    /// Trim markers survive as empty comment actions around the text.
    pub fn substitute(&self, text: &str) -> String {
        if text.is_empty() {
            return match (self.trim_left, self.trim_right) {
                (false, false) => String::new(),
                (true, false) => "{{- /* */}}".to_string(),
                (false, true) => "{{/* */ -}}".to_string(),
                (true, true) => "{{- /* */ -}}".to_string(),
            };
        }
        let mut out = String::with_capacity(text.len() + 24);
        if self.trim_left {
            out.push_str("{{- /* */}}");
        }
        out.push_str(text);
        if self.trim_right {
            out.push_str("{{/* */ -}}");
        }
        out
    }

    /// Replacement text that removes the directive
    pub fn erase(&self) -> String {
        self.substitute("")
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// Find every directive of `kind` in `body`, in source order
pub fn find_all(body: &str, kind: DirectiveKind) -> Vec<Directive> {
    scan(body)
        .into_iter()
        .filter(|d| d.kind == kind)
        .collect()
}

/// Find the first directive of `kind` in `body`
pub fn find_first(body: &str, kind: DirectiveKind) -> Option<Directive> {
    find_all(body, kind).into_iter().next()
}

/// Find every directive of any kind in `body`, in source order
pub fn scan(body: &str) -> Vec<Directive> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = body[pos..].find("{{") {
        let open = pos + offset;
        // Same action boundaries as the engine's lexer
        let Some(close) = find_close(&body[open + 2..]).map(|rel| open + 2 + rel) else {
            break;
        };
        if let Some(directive) = parse_action(body, open, close) {
            found.push(directive);
        }
        pos = close + 2;
    }
    found
}

/// Parse the action spanning `open..close + 2` as a directive
fn parse_action(body: &str, open: usize, close: usize) -> Option<Directive> {
    let mut inner = &body[open + 2..close];

    let trim_left = inner.starts_with('-') && inner[1..].starts_with(char::is_whitespace);
    if trim_left {
        inner = &inner[1..];
    }
    let trim_right = inner
        .strip_suffix('-')
        .is_some_and(|rest| rest.ends_with(char::is_whitespace));
    if trim_right {
        inner = &inner[..inner.len() - 1];
    }

    let inner = inner.trim_start();
    let (kind, rest) = DirectiveKind::ALL.iter().find_map(|kind| {
        let rest = inner.strip_prefix(kind.keyword())?;
        rest.starts_with(|c: char| c.is_whitespace() || is_quote(c))
            .then_some((*kind, rest.trim_start()))
    })?;

    let (argument, rest) = split_argument(rest)?;
    let context = rest.trim();

    Some(Directive {
        kind,
        span: open..close + 2,
        argument,
        context: (!context.is_empty()).then(|| context.to_string()),
        trim_left,
        trim_right,
    })
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

/// Split a quoted or bare argument off the front of `s`
fn split_argument(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;

    if !is_quote(first) {
        let end = s.find(char::is_whitespace).unwrap_or(s.len());
        return Some((s[..end].to_string(), &s[end..]));
    }

    let mut argument = String::new();
    while let Some((i, c)) = chars.next() {
        if c == first {
            return Some((argument, &s[i + c.len_utf8()..]));
        }
        if c == '\\' && first == '"' {
            let (_, escaped) = chars.next()?;
            argument.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
        } else {
            argument.push(c);
        }
    }
    None
}

/// Apply replacements to `body`
///
/// `edits` must be sorted by span start and must not overlap.
pub fn splice(body: &str, edits: impl IntoIterator<Item = (Span, String)>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut pos = 0;
    for (span, replacement) in edits {
        out.push_str(&body[pos..span.start]);
        out.push_str(&replacement);
        pos = span.end;
    }
    out.push_str(&body[pos..]);
    out
}
