//! Include inliner: literal textual inclusion of other files

use tracing::debug;

use super::reader::{logical_name, SourceReader};
use super::scanner::{self, DirectiveKind};
use crate::error::TemplateError;

/// Replace every `include` directive in `body` with the referenced file's text
///
/// Included text is inlined recursively, so the result contains no
/// `include` directives. A missing or empty include fails the whole call,
/// as does an include that leads back to a file already being included.
pub fn inline_includes(body: &str, reader: &dyn SourceReader) -> Result<String, TemplateError> {
    inline_nested(body, reader, &mut Vec::new())
}

/// Inline includes with `including` holding the files currently being expanded
pub(crate) fn inline_nested(
    body: &str,
    reader: &dyn SourceReader,
    including: &mut Vec<String>,
) -> Result<String, TemplateError> {
    let directives = scanner::find_all(body, DirectiveKind::Include);
    if directives.is_empty() {
        return Ok(body.to_string());
    }

    let mut edits = Vec::with_capacity(directives.len());
    for directive in directives {
        let name = logical_name(&directive.argument);
        if including.contains(&name) {
            let mut chain = including.clone();
            chain.push(name);
            return Err(TemplateError::cycle(chain));
        }

        let content = reader.read(&name)?;
        including.push(name);
        let inlined = inline_nested(&content, reader, including);
        let name = including.pop().unwrap_or_default();
        let inlined = inlined?;

        debug!(include = %name, bytes = inlined.len(), "inlined include");
        edits.push((directive.span.clone(), directive.substitute(&inlined)));
    }

    Ok(scanner::splice(body, edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::reader::MemoryReader;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_includes() {
        let reader = MemoryReader::new()
            .with_file("nav.html", r#"<nav>{{ include "links.html" }}</nav>"#)
            .with_file("links.html", "<a>home</a>");
        let body = r#"<body>{{ include "nav.html" }}</body>"#;
        assert_eq!(
            inline_includes(body, &reader).unwrap(),
            "<body><nav><a>home</a></nav></body>"
        );
    }

    #[test]
    fn test_inlining_is_idempotent() {
        let reader = MemoryReader::new().with_file("a.html", "A");
        let once = inline_includes(r#"x{{ include "a.html" }}y"#, &reader).unwrap();
        let twice = inline_includes(&once, &reader).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let reader = MemoryReader::new();
        let err = inline_includes(r#"{{ include "gone.html" }}"#, &reader).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { ref name } if name == "gone.html"));
    }

    #[test]
    fn test_empty_include_is_fatal() {
        let reader = MemoryReader::new().with_file("blank.html", "");
        let err = inline_includes(r#"{{ include "blank.html" }}"#, &reader).unwrap_err();
        assert!(matches!(err, TemplateError::Empty { .. }));
    }

    #[test]
    fn test_include_cycle() {
        let reader = MemoryReader::new()
            .with_file("a.html", r#"{{ include "b.html" }}"#)
            .with_file("b.html", r#"{{ include "a.html" }}"#);
        let err = inline_includes(r#"{{ include "a.html" }}"#, &reader).unwrap_err();
        match err {
            TemplateError::CycleDetected { chain } => {
                assert_eq!(chain, vec!["a.html", "b.html", "a.html"])
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_same_file_included_twice_is_not_a_cycle() {
        let reader = MemoryReader::new().with_file("hr.html", "<hr>");
        let body = r#"{{ include "hr.html" }}|{{ include "hr.html" }}"#;
        assert_eq!(inline_includes(body, &reader).unwrap(), "<hr>|<hr>");
    }

    #[test]
    fn test_trim_markers_survive() {
        let reader = MemoryReader::new().with_file("a.html", "A");
        assert_eq!(
            inline_includes("x {{- include \"a.html\" }}", &reader).unwrap(),
            "x {{- /* */}}A"
        );
    }
}
