//! Error types for composition, loading and template parsing

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::engine::lexer::Token;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Errors reported by the template parser
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    #[error("unclosed action starting at {}", span.start)]
    Unclosed { span: Span },

    #[error("function \"{name}\" not defined")]
    UndefinedFunction { name: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. }
            | ParseError::Unclosed { span }
            | ParseError::UndefinedFunction { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let (message, detail) = match self {
            ParseError::Syntax {
                message, expected, ..
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };
                (message.clone(), format!("{}{}", message, expected_str))
            }
            ParseError::Unclosed { .. } => (
                "unclosed action".to_string(),
                "this '{{' has no matching '}}'".to_string(),
            ),
            ParseError::UndefinedFunction { name, .. } => (
                self.to_string(),
                format!("'{}' is not in the function map", name),
            ),
        };

        // Clamp so an end-of-input span still points inside the source
        let end = self.span().end.min(source.len());
        let start = self.span().start.min(end);

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, start)
            .with_message(&message)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(detail)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => format!("{}: {}", filename, message),
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, Token>) -> Self {
        use chumsky::error::RichReason;

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                chumsky::error::RichPattern::Any => Some("any token".to_string()),
                chumsky::error::RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Text(_) => "text".to_string(),
        Token::Open => "'{{'".to_string(),
        Token::Close => "'}}'".to_string(),
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::Fields(f) => format!("field '.{}'", f.join(".")),
        Token::Variable(v) => format!("variable '{}'", v.name),
        Token::Dot => "'.'".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Declare => "':='".to_string(),
        Token::Define => "keyword 'define'".to_string(),
        Token::Template => "keyword 'template'".to_string(),
        Token::End => "keyword 'end'".to_string(),
        Token::If => "keyword 'if'".to_string(),
        Token::Else => "keyword 'else'".to_string(),
        Token::Range => "keyword 'range'".to_string(),
        Token::With => "keyword 'with'".to_string(),
        Token::True => "'true'".to_string(),
        Token::False => "'false'".to_string(),
        Token::Nil => "'nil'".to_string(),
    }
}

/// Errors that abort the composition of a leaf file or a whole load pass
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Referenced file, base directory or registry entry does not exist
    #[error("template not found: {name}")]
    NotFound { name: String },

    /// Source file read as zero-length content
    #[error("template is empty: {name}")]
    Empty { name: String },

    /// File unreadable for reasons other than absence
    #[error("error reading template {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine rejected a composed unit
    #[error("failed to parse {unit}: {error}")]
    ParseFailure {
        unit: String,
        /// Rewritten source handed to the engine, kept for diagnostics
        source_text: String,
        error: ParseError,
    },

    /// An `extends` or `include` chain loops back on itself
    #[error("circular template reference detected: {}", chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },
}

impl TemplateError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn cycle(chain: Vec<String>) -> Self {
        Self::CycleDetected { chain }
    }

    /// Logical name of the file the error is about, if any
    pub fn template_name(&self) -> Option<&str> {
        match self {
            Self::NotFound { name } | Self::Empty { name } | Self::Io { name, .. } => Some(name),
            Self::ParseFailure { unit, .. } => Some(unit),
            Self::CycleDetected { chain } => chain.last().map(String::as_str),
        }
    }

    /// Render the error, using an ariadne report for parse failures
    pub fn report(&self) -> String {
        match self {
            Self::ParseFailure {
                unit,
                source_text,
                error,
            } => error.format(source_text, unit),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = TemplateError::cycle(vec![
            "a.html".to_string(),
            "b.html".to_string(),
            "a.html".to_string(),
        ]);
        assert!(err.to_string().contains("a.html -> b.html -> a.html"));
        assert_eq!(err.template_name(), Some("a.html"));
    }

    #[test]
    fn test_empty_display_names_file() {
        let err = TemplateError::Empty {
            name: "pages/blank.html".to_string(),
        };
        assert_eq!(err.to_string(), "template is empty: pages/blank.html");
    }

    #[test]
    fn test_parse_failure_report_mentions_unit() {
        let err = TemplateError::ParseFailure {
            unit: "index.html".to_string(),
            source_text: "<p>{{ shout .X }}</p>".to_string(),
            error: ParseError::UndefinedFunction {
                name: "shout".to_string(),
                span: 6..11,
            },
        };
        let report = err.report();
        assert!(report.contains("index.html"));
        assert!(report.contains("shout"));
    }

    #[test]
    fn test_format_clamps_out_of_range_span() {
        let err = ParseError::Unclosed { span: 2..40 };
        let out = err.format("a {{ .X", "broken.html");
        assert!(out.contains("unclosed action"));
    }
}
