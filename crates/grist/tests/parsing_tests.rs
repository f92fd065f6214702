//! Table-driven tests for file parsing, across formats and input shapes.

mod common;

use std::path::Path;

use serde_json::{json, Value};

use common::*;
use grist::{GristError, Loader, ParseOptions, Registry, Renderer, Resources};

/// Represents a single parsing test case.
struct ParseTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// File name, which selects the parser.
    file: &'static str,
    /// File content.
    content: &'static str,
    /// Expected `<kind>:<name>` keys in order, if parsing should succeed.
    expected: Option<&'static [&'static str]>,
    /// Expected error substring, if parsing should fail.
    expected_error: Option<&'static str>,
}

const PARSE_TESTS: &[ParseTestCase] = &[
    ParseTestCase {
        name: "yaml_envelope",
        file: "folder.yaml",
        content: "kind: DashboardFolder\nmetadata:\n  name: x\nspec:\n  title: X\n",
        expected: Some(&["DashboardFolder:x"]),
        expected_error: None,
    },
    ParseTestCase {
        name: "json_envelope",
        file: "folder.json",
        content: r#"{"kind": "DashboardFolder", "metadata": {"name": "x"}, "spec": {"title": "X"}}"#,
        expected: Some(&["DashboardFolder:x"]),
        expected_error: None,
    },
    ParseTestCase {
        name: "yaml_multi_document",
        file: "many.yml",
        content: "kind: DashboardFolder\nmetadata: {name: b}\nspec: {title: B}\n---\nkind: DashboardFolder\nmetadata: {name: a}\nspec: {title: A}\n",
        expected: Some(&["DashboardFolder:b", "DashboardFolder:a"]),
        expected_error: None,
    },
    ParseTestCase {
        name: "bare_dashboard_spec",
        file: "dash.json",
        content: r#"{"uid": "abc", "title": "T", "panels": [], "schemaVersion": 39}"#,
        expected: Some(&["Dashboard:abc"]),
        expected_error: None,
    },
    ParseTestCase {
        name: "nested_envelopes",
        file: "rendered.json",
        content: r#"{"z": {"kind": "DashboardFolder", "metadata": {"name": "z"}, "spec": {"title": "Z"}},
                     "a": [{"kind": "DashboardFolder", "metadata": {"name": "a"}, "spec": {"title": "A"}}, null]}"#,
        expected: Some(&["DashboardFolder:a", "DashboardFolder:z"]),
        expected_error: None,
    },
    ParseTestCase {
        name: "invalid_envelope_reports_every_problem",
        file: "bad.yaml",
        content: "kind: ''\nmetadata: {}\nspec: {}\n",
        expected: None,
        expected_error: Some("attribute \"kind\" must not be empty; missing attribute \"metadata.name\"; attribute \"spec\" must not be empty"),
    },
    ParseTestCase {
        name: "unknown_kind",
        file: "unknown.yaml",
        content: "kind: Alert\nmetadata: {name: a}\nspec: {x: 1}\n",
        expected: None,
        expected_error: Some("Unknown resource kind: Alert"),
    },
    ParseTestCase {
        name: "dead_end_in_rendered_tree",
        file: "rendered.json",
        content: r#"{"items": {"broken": {"kind": "DashboardFolder", "metadata": {"name": "b"}}}}"#,
        expected: None,
        expected_error: Some("found invalid object (at .items.broken.kind): Invalid resource envelope: missing attribute \"spec\""),
    },
    ParseTestCase {
        name: "malformed_json",
        file: "broken.json",
        content: "{\"kind\": ",
        expected: None,
        expected_error: Some("Failed to parse JSON"),
    },
];

fn registry() -> Registry {
    registry_with(vec![
        Box::new(MemoryHandler::new("DashboardFolder")),
        Box::new(
            MemoryHandler::new("Dashboard")
                .folders()
                .detect_by(&["panels", "title", "schemaVersion"]),
        ),
    ])
}

fn keys(resources: &Resources) -> Vec<String> {
    resources.iter().map(|r| r.key()).collect()
}

#[test]
fn test_parse_cases() {
    let registry = registry();
    let options = ParseOptions {
        default_folder_uid: Some("general".to_string()),
        ..Default::default()
    };
    let loader = Loader::new(&registry, options);

    for case in PARSE_TESTS {
        let harness = TestHarness::new();
        let path = harness.write(case.file, case.content);
        let result = loader.parse_path(&path);

        match (case.expected, case.expected_error, result) {
            (Some(expected), None, Ok(resources)) => {
                assert_eq!(keys(&resources), expected.to_vec(), "case {}", case.name);
            }
            (None, Some(fragment), Err(e)) => {
                assert!(
                    e.to_string().contains(fragment),
                    "case {}: error '{}' does not contain '{}'",
                    case.name,
                    e,
                    fragment
                );
            }
            (_, _, Ok(resources)) => {
                panic!("case {}: expected an error, got {:?}", case.name, keys(&resources))
            }
            (_, _, Err(e)) => panic!("case {}: unexpected error: {}", case.name, e),
        }
    }
}

#[test]
fn test_bare_spec_without_folder_fails() {
    let registry = registry();
    let loader = Loader::new(&registry, ParseOptions::default());
    let harness = TestHarness::new();
    let path = harness.write(
        "dash.json",
        r#"{"uid": "abc", "title": "T", "panels": [], "schemaVersion": 39}"#,
    );
    assert!(matches!(
        loader.parse_path(&path),
        Err(GristError::MissingFolder { .. })
    ));
}

#[test]
fn test_walker_finds_every_embedded_envelope() {
    // Envelopes at depths 1 to 4 with no envelope above them. Keys are
    // visited in sorted order: nest.deeper, nest.two, one.
    let tree = json!({
        "one": {"kind": "DashboardFolder", "metadata": {"name": "d1"}, "spec": {"title": "1"}},
        "nest": {
            "two": {"kind": "DashboardFolder", "metadata": {"name": "d2"}, "spec": {"title": "2"}},
            "deeper": [[{"kind": "DashboardFolder", "metadata": {"name": "d4"}, "spec": {"title": "4"}}]]
        }
    });

    let registry = registry();
    let resources = grist::parse_any(&registry, tree.clone(), &ParseOptions::default()).unwrap();
    assert_eq!(
        keys(&resources),
        vec!["DashboardFolder:d4", "DashboardFolder:d2", "DashboardFolder:d1"]
    );
    for resource in &resources {
        let title: Value = resource.get_spec_value("title").unwrap().clone();
        assert_eq!(title, json!(&resource.name()[1..]));
    }

    let again = grist::parse_any(&registry, tree, &ParseOptions::default()).unwrap();
    assert_eq!(keys(&again), keys(&resources));
}

struct StaticRenderer(Value);

impl Renderer for StaticRenderer {
    fn render(&self, _path: &Path) -> grist::Result<Value> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_directory_with_templates_and_targets() {
    let harness = TestHarness::new();
    harness.write("a.yaml", "kind: DashboardFolder\nmetadata: {name: a}\nspec: {title: A}\n");
    harness.write("main.jsonnet", "// rendered by the test renderer");
    harness.write("lib/helpers.libsonnet", "{}");
    harness.write(".git/config.yaml", "not: parsed");
    harness.write("notes.md", "ignored");

    let rendered = json!({
        "folders": {
            "b": {"kind": "DashboardFolder", "metadata": {"name": "b"}, "spec": {"title": "B"}},
            "skip": {"kind": "DashboardFolder", "metadata": {"name": "skip"}, "spec": {"title": "S"}}
        }
    });

    let registry = registry();
    let loader = Loader::new(
        &registry,
        ParseOptions::default().with_targets(vec!["DashboardFolder/[ab]".to_string()]),
    )
    .with_renderer(Box::new(StaticRenderer(rendered)));

    // Each template file renders the same tree: a, then b twice.
    let resources = loader.parse_path(harness.path()).unwrap();
    assert_eq!(
        keys(&resources),
        vec!["DashboardFolder:a", "DashboardFolder:b", "DashboardFolder:b"]
    );
}
