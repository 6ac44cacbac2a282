//! Integration tests for template composition over a real directory

use std::fs;
use std::path::Path;

use layered_render::compose::{inline_includes, resolve_chain, FsReader};
use layered_render::{execute_by_name, load_all, LoaderConfig, TemplateError, TemplateRegistry};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    for (name, body) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, body).expect("write template");
    }
    dir
}

fn render(registry: &TemplateRegistry, name: &str, data: &Value) -> String {
    let mut out = Vec::new();
    execute_by_name(registry, name, data, &mut out).expect("Should render");
    String::from_utf8(out).expect("utf-8 output")
}

fn load(dir: &Path) -> TemplateRegistry {
    load_all(dir).expect("Should load")
}

#[test]
fn test_round_trip_child_overrides_title() {
    let dir = tree(&[
        (
            "base.html",
            r#"{{ define "title" }}Base{{ end }}<h1>{{ template "title" }}</h1>"#,
        ),
        (
            "child.html",
            r#"{{ extends "base.html" }}{{ define "title" }}Child{{ end }}"#,
        ),
    ]);
    let registry = load(dir.path());
    assert_eq!(render(&registry, "child.html", &Value::Null), "<h1>Child</h1>");
    assert_eq!(render(&registry, "base.html", &Value::Null), "<h1>Base</h1>");
}

#[test]
fn test_override_precedence_over_three_levels() {
    let dir = tree(&[
        (
            "a.html",
            r#"{{ define "X" }}from A{{ end }}[{{ template "X" }}]"#,
        ),
        (
            "b.html",
            r#"{{ extends "a.html" }}{{ define "X" }}from B{{ end }}"#,
        ),
        ("c.html", r#"{{ extends "b.html" }}"#),
    ]);
    let registry = load(dir.path());
    assert_eq!(render(&registry, "c.html", &Value::Null), "[from B]");
    assert_eq!(render(&registry, "b.html", &Value::Null), "[from B]");
    assert_eq!(render(&registry, "a.html", &Value::Null), "[from A]");
}

#[test]
fn test_block_defined_in_leaf_only() {
    let dir = tree(&[
        ("layout.html", r#"<main>{{ template "content" . }}</main>"#),
        (
            "pages/about.html",
            r#"{{ extends "layout.html" }}{{ define "content" }}About {{ .Who }}{{ end }}"#,
        ),
    ]);
    let registry = load(dir.path());
    assert_eq!(
        render(&registry, "pages/about.html", &json!({"Who": "us"})),
        "<main>About us</main>"
    );
    assert_eq!(render(&registry, "layout.html", &Value::Null), "<main></main>");
}

#[test]
fn test_orphan_invocation_renders_empty() {
    let dir = tree(&[(
        "page.html",
        r#"<head>{{ template "extra_head" . }}</head>"#,
    )]);
    let registry = load(dir.path());
    assert_eq!(render(&registry, "page.html", &Value::Null), "<head></head>");
}

#[test]
fn test_context_defaults_to_dot() {
    let dir = tree(&[
        (
            "implicit.html",
            r#"{{ define "name" }}{{ .Name }}{{ end }}<{{ template "name" }}>"#,
        ),
        (
            "explicit.html",
            r#"{{ define "name" }}{{ .Name }}{{ end }}<{{ template "name" . }}>"#,
        ),
    ]);
    let registry = load(dir.path());
    let data = json!({"Name": "Ann"});
    assert_eq!(render(&registry, "implicit.html", &data), "<Ann>");
    assert_eq!(
        render(&registry, "implicit.html", &data),
        render(&registry, "explicit.html", &data)
    );
}

#[test]
fn test_explicit_context_is_passed() {
    let dir = tree(&[(
        "page.html",
        r#"{{ define "user" }}{{ .Name }}{{ end }}{{ template "user" .Owner }}"#,
    )]);
    let registry = load(dir.path());
    assert_eq!(
        render(&registry, "page.html", &json!({"Owner": {"Name": "Bo"}})),
        "Bo"
    );
}

#[test]
fn test_diamond_dependency_appears_once() {
    let dir = tree(&[
        ("a.html", r#"<{{ template "body" . }}>"#),
        ("f.html", "frag"),
        (
            "b.html",
            r#"{{ extends "a.html" }}{{ define "body" }}B{{ template "f.html" }}{{ end }}"#,
        ),
        (
            "c.html",
            r#"{{ extends "a.html" }}{{ define "body" }}C{{ template "f.html" }}{{ template "b.html" }}{{ end }}"#,
        ),
    ]);
    let reader = FsReader::new(dir.path());
    let chain = resolve_chain("c.html", &reader, &LoaderConfig::default()).unwrap();
    let names = chain.stack.names();
    assert_eq!(names.iter().filter(|n| **n == "f.html").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "a.html").count(), 1);
    assert_eq!(chain.entry, "a.html");

    // b.html only contributes its block; its own top level is empty
    let registry = load(dir.path());
    assert_eq!(render(&registry, "c.html", &Value::Null), "<Cfrag>");
    assert_eq!(render(&registry, "b.html", &Value::Null), "<Bfrag>");
}

#[test]
fn test_equivalent_references_share_one_unit() {
    let dir = tree(&[
        ("f.html", r#"{{ define "x" }}X{{ end }}[{{ template "x" }}]"#),
        (
            "p.html",
            r#"{{ template "f.html" }}{{ template "sub/../f.html" }}{{ template ".\\f.html" }}"#,
        ),
    ]);
    let reader = FsReader::new(dir.path());
    let chain = resolve_chain("p.html", &reader, &LoaderConfig::default()).unwrap();
    assert_eq!(chain.stack.names(), vec!["f.html", "p.html"]);

    let registry = load(dir.path());
    assert_eq!(render(&registry, "p.html", &Value::Null), "[X][X][X]");
}

#[test]
fn test_includes_nest_and_inline_idempotently() {
    let dir = tree(&[
        ("partials/nav.html", r#"<nav>{{ include "partials/link.html" }}</nav>"#),
        ("partials/link.html", "<a>{{ .Home }}</a>"),
        ("page.html", r#"{{ include "partials/nav.html" }}<p>body</p>"#),
    ]);
    let reader = FsReader::new(dir.path());
    let once = inline_includes(
        &fs::read_to_string(dir.path().join("page.html")).unwrap(),
        &reader,
    )
    .unwrap();
    assert_eq!(once, "<nav><a>{{ .Home }}</a></nav><p>body</p>");
    assert_eq!(inline_includes(&once, &reader).unwrap(), once);

    let registry = load(dir.path());
    assert_eq!(
        render(&registry, "page.html", &json!({"Home": "/"})),
        "<nav><a>/</a></nav><p>body</p>"
    );
}

#[test]
fn test_include_can_carry_block_definitions() {
    let dir = tree(&[
        ("base.html", r#"<title>{{ template "title" }}</title>"#),
        ("titles.html", r#"{{ define "title" }}Shared{{ end }}"#),
        (
            "page.html",
            r#"{{ extends "base.html" }}{{ include "titles.html" }}"#,
        ),
    ]);
    let registry = load(dir.path());
    assert_eq!(render(&registry, "page.html", &Value::Null), "<title>Shared</title>");
}

#[test]
fn test_recursive_fragment() {
    let dir = tree(&[(
        "tree.html",
        r#"{{ .Name }}{{ if .Children }}({{ range .Children }}{{ template "tree.html" . }}{{ end }}){{ end }}"#,
    )]);
    let registry = load(dir.path());
    let data = json!({"Name": "root", "Children": [{"Name": "a"}, {"Name": "b", "Children": [{"Name": "c"}]}]});
    assert_eq!(render(&registry, "tree.html", &data), "root(ab(c))");
}

#[test]
fn test_trim_markers_survive_rewrites() {
    let dir = tree(&[(
        "page.html",
        "{{ define \"x\" }}X{{ end }}<p>\n  {{- template \"x\" -}}\n  {{- template \"missing\" -}}\n</p>",
    )]);
    let registry = load(dir.path());
    assert_eq!(render(&registry, "page.html", &Value::Null), "<p>X</p>");
}

#[test]
fn test_extends_cycle_is_detected() {
    let dir = tree(&[
        ("a.html", r#"{{ extends "b.html" }}"#),
        ("b.html", r#"{{ extends "a.html" }}"#),
    ]);
    match load_all(dir.path()).unwrap_err() {
        TemplateError::CycleDetected { chain } => {
            assert_eq!(chain, vec!["a.html", "b.html", "a.html"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_include_cycle_is_detected() {
    let dir = tree(&[("loop.html", r#"x{{ include "loop.html" }}"#)]);
    assert!(matches!(
        load_all(dir.path()),
        Err(TemplateError::CycleDetected { .. })
    ));
}

#[test]
fn test_composed_source_is_inspectable() {
    let dir = tree(&[
        (
            "base.html",
            r#"<h1>{{ template "title" .Page }}</h1>{{ template "nav.html" }}"#,
        ),
        ("nav.html", "<nav/>"),
        (
            "home.html",
            r#"{{ extends "base.html" }}{{ define "title" }}{{ .Title }}{{ end }}"#,
        ),
    ]);
    let registry = load(dir.path());
    let home = registry.get("home.html").unwrap();
    assert_eq!(home.entry(), "base.html");
    assert_eq!(home.bindings().get("title"), Some("__block_0"));

    let source: Vec<String> = home
        .units()
        .iter()
        .map(|u| format!("{} | {}", u.name(), u.body))
        .collect();
    insta::assert_snapshot!(source.join("\n"), @r###"
    nav.html | <nav/>
    base.html | <h1>{{ template "__block_0" .Page }}</h1>{{ template "nav.html" . }}
    home.html | {{ define "__block_0" }}{{ .Title }}{{ end }}
    "###);
}
