use std::collections::HashMap;

use okh_gen::contract::{FieldValue, GenerationLayer, GenerationSource};
use okh_gen::layers::{DirectLayer, HeuristicLayer};
use okh_gen::project::{ProjectData, ProjectFile};

fn project(metadata: Vec<(&str, serde_json::Value)>, files: Vec<(&str, &str)>) -> ProjectData {
    ProjectData {
        platform: "github".to_string(),
        url: "https://github.com/acme/widget".to_string(),
        metadata: metadata
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        files: files
            .into_iter()
            .map(|(path, content)| ProjectFile {
                path: path.to_string(),
                size: content.len() as u64,
                content: Some(content.to_string()),
                file_type: None,
            })
            .collect(),
        documentation: Vec::new(),
        raw_content: HashMap::new(),
    }
}

fn text_value(value: &FieldValue) -> &str {
    value.as_text().expect("text field")
}

#[tokio::test]
async fn test_direct_layer_maps_platform_metadata() {
    let snapshot = project(
        vec![
            ("name", serde_json::json!("Widget")),
            ("version", serde_json::json!("1.2.0")),
            (
                "license",
                serde_json::json!({"key": "mit", "name": "MIT License", "spdx_id": "MIT"}),
            ),
            ("owner", serde_json::json!({"login": "acme"})),
            ("language", serde_json::json!("English")),
            ("description", serde_json::json!("A desktop widget.")),
        ],
        vec![],
    );

    let result = DirectLayer.process(&snapshot).await.expect("layer runs");

    assert_eq!(text_value(&result.fields["title"].value), "Widget");
    assert_eq!(text_value(&result.fields["version"].value), "1.2.0");
    assert_eq!(
        text_value(&result.fields["license"].value),
        "MIT",
        "SPDX id outranks the display name in a license object"
    );
    assert_eq!(text_value(&result.fields["licensor"].value), "acme");
    assert_eq!(
        text_value(&result.fields["documentation_language"].value),
        "English"
    );
    assert_eq!(
        text_value(&result.fields["function"].value),
        "A desktop widget."
    );
    for generation in result.fields.values() {
        assert_eq!(generation.source_layer, GenerationSource::Direct);
        assert_eq!(generation.generation_method, "platform_metadata");
    }
    assert_eq!(result.confidence_scores.len(), result.fields.len());
}

#[tokio::test]
async fn test_direct_layer_produces_nothing_for_absent_keys() {
    let snapshot = project(vec![("stars", serde_json::json!(42))], vec![]);
    let result = DirectLayer.process(&snapshot).await.expect("layer runs");
    assert!(result.fields.is_empty());
    assert!(result.errors.is_empty());
}

const README: &str = "\
# Widget Deluxe

[![build](https://example.com/badge.svg)](https://example.com)

Widget Deluxe is a compact desktop widget for the home office. The current
release is v2.1.0 and the parts are printable on any FDM printer.

## Usage

Print the parts and follow the assembly guide.
";

#[tokio::test]
async fn test_heuristic_layer_reads_title_function_version_language() {
    let snapshot = project(vec![], vec![("README.md", README)]);
    let result = HeuristicLayer.process(&snapshot).await.expect("layer runs");

    assert_eq!(text_value(&result.fields["title"].value), "Widget Deluxe");
    assert!(
        text_value(&result.fields["function"].value).starts_with("Widget Deluxe is a compact"),
        "First prose paragraph becomes the function"
    );
    assert_eq!(text_value(&result.fields["version"].value), "2.1.0");
    assert_eq!(
        text_value(&result.fields["documentation_language"].value),
        "en"
    );
    for generation in result.fields.values() {
        assert_eq!(generation.source_layer, GenerationSource::Heuristic);
    }
    assert!(
        result.fields["title"].confidence > result.fields["function"].confidence,
        "Heading extraction is more reliable than paragraph extraction"
    );
}

#[tokio::test]
async fn test_heuristic_layer_detects_license_from_license_file() {
    let snapshot = project(
        vec![],
        vec![(
            "LICENSE",
            "MIT License\n\nPermission is hereby granted, free of charge...",
        )],
    );
    let result = HeuristicLayer.process(&snapshot).await.expect("layer runs");

    let license = &result.fields["license"];
    assert_eq!(text_value(&license.value), "MIT");
    assert_eq!(license.raw_source.as_deref(), Some("LICENSE"));
}

#[tokio::test]
async fn test_heuristic_layer_is_empty_for_sparse_projects() {
    let snapshot = project(vec![], vec![("main.rs", "fn main() {}")]);
    let result = HeuristicLayer.process(&snapshot).await.expect("layer runs");
    assert!(result.fields.is_empty());
    assert!(
        !result.processing_log.is_empty(),
        "The layer still logs what it looked for"
    );
}
