//! Lexer for template source using logos
//!
//! Template source is first split into literal text and `{{ ... }}` actions.
//! Action interiors are then tokenized with logos. The resulting flat token
//! stream (`Text`, `Open`, action tokens, `Close`) is what the grammar parses.

use logos::Logos;

use crate::error::{ParseError, Span};

/// A `$name.Field.Chain` reference
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
    pub fields: Vec<String>,
}

impl VarRef {
    fn from_slice(slice: &str) -> Self {
        let mut parts = slice.split('.');
        let name = parts.next().unwrap_or("$").to_string();
        Self {
            name,
            fields: parts.map(str::to_string).collect(),
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Produced by the splitter, never by logos
    Text(String),
    Open,
    Close,

    // Keywords
    #[token("define")]
    Define,
    #[token("template")]
    Template,
    #[token("end")]
    End,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("range")]
    Range,
    #[token("with")]
    With,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // Punctuation
    #[token("|")]
    Pipe,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token(":=")]
    Declare,
    #[token(".")]
    Dot,

    /// Field chain relative to dot: `.User.Name`
    #[regex(r"(\.[a-zA-Z_][a-zA-Z0-9_]*)+", |lex| split_fields(lex.slice()))]
    Fields(Vec<String>),

    #[regex(r"\$[a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*", |lex| VarRef::from_slice(lex.slice()))]
    Variable(VarRef),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r"`[^`]*`", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

fn split_fields(slice: &str) -> Vec<String> {
    slice
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn unquote(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split template source into text and action tokens with spans
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while pos < input.len() {
        let Some(offset) = input[pos..].find("{{") else {
            push_text(&mut tokens, input, pos..input.len(), trim_next, false);
            break;
        };
        let open = pos + offset;
        let left_trim = has_left_trim(&input[open + 2..]);
        push_text(&mut tokens, input, pos..open, trim_next, left_trim);

        let inner_start = if left_trim { open + 3 } else { open + 2 };
        let close = match find_close(&input[inner_start..]) {
            Some(rel) => inner_start + rel,
            None => return Err(ParseError::Unclosed { span: open..input.len() }),
        };
        let right_trim = has_right_trim(&input[inner_start..close]);
        let inner_end = if right_trim { close - 1 } else { close };
        let inner = &input[inner_start..inner_end];

        if !is_comment(inner) {
            tokens.push((Token::Open, open..open + 2));
            for (tok, span) in Token::lexer(inner).spanned() {
                let span = inner_start + span.start..inner_start + span.end;
                match tok {
                    Ok(tok) => tokens.push((tok, span)),
                    Err(()) => {
                        return Err(ParseError::Syntax {
                            message: format!("unexpected '{}' in action", &input[span.clone()]),
                            span,
                            expected: vec![],
                        })
                    }
                }
            }
            tokens.push((Token::Close, close..close + 2));
        }

        pos = close + 2;
        trim_next = right_trim;
    }

    Ok(tokens)
}

/// Offset of the `}}` that closes an action whose interior starts at `inner`
///
/// `}}` inside a quoted string or a leading `/* */` comment does not close
/// the action. Returns `None` if the action never closes.
pub fn find_close(inner: &str) -> Option<usize> {
    let bytes = inner.as_bytes();
    let mut i = comment_end(inner).unwrap_or(0);
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'}' if bytes[i + 1] == b'}' => return Some(i),
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 1;
                    }
                    i += 1;
                }
                if i >= bytes.len() {
                    return None;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// End of a comment opening the action interior, past its `*/`
fn comment_end(inner: &str) -> Option<usize> {
    let rest = inner.strip_prefix('-').unwrap_or(inner).trim_start();
    let body = rest.strip_prefix("/*")?;
    let start = inner.len() - body.len();
    Some(match body.find("*/") {
        Some(rel) => start + rel + 2,
        None => inner.len(),
    })
}

fn push_text(
    tokens: &mut Vec<(Token, Span)>,
    input: &str,
    span: Span,
    trim_start: bool,
    trim_end: bool,
) {
    let mut text = &input[span.clone()];
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        tokens.push((Token::Text(text.to_string()), span));
    }
}

/// `{{- ` trims preceding whitespace; the dash must be followed by a space
fn has_left_trim(after_open: &str) -> bool {
    let mut chars = after_open.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

/// ` -}}` trims following whitespace; the dash must be preceded by a space
fn has_right_trim(inner: &str) -> bool {
    inner
        .strip_suffix('-')
        .is_some_and(|rest| rest.ends_with(char::is_whitespace))
}

fn is_comment(inner: &str) -> bool {
    let trimmed = inner.trim();
    trimmed.starts_with("/*") && trimmed.ends_with("*/")
}
