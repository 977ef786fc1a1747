use okh_gen::bom::processor::process_sources;
use okh_gen::bom::{BomSource, SourceType};
use okh_gen::config::BomConfig;

fn source(source_type: SourceType, content: &str, path: &str, confidence: f64) -> BomSource {
    BomSource::new(source_type, content, path, confidence).expect("valid test source")
}

#[test]
fn test_csv_rows_become_components() {
    let csv = source(
        SourceType::BomFile,
        "Item,Quantity,Unit\nResistor,10,pcs\nLED,5,pcs",
        "bom.csv",
        0.9,
    );
    let components = process_sources(&[csv], &BomConfig::default());

    assert_eq!(components.len(), 2, "Exactly two components expected");
    assert_eq!(components[0].name, "Resistor");
    assert_eq!(components[0].quantity, 10.0);
    assert_eq!(components[0].unit, "pcs");
    assert_eq!(components[1].name, "LED");
    assert_eq!(components[1].quantity, 5.0);
    assert_eq!(components[1].unit, "pcs");
}

#[test]
fn test_csv_missing_quantity_and_unit_default() {
    let csv = source(
        SourceType::BomFile,
        "Part,Notes\nFrame,aluminium profile\nBase plate,laser cut",
        "parts.csv",
        0.85,
    );
    let components = process_sources(&[csv], &BomConfig::default());

    assert_eq!(components.len(), 2);
    for component in &components {
        assert_eq!(component.quantity, 1.0, "Missing quantity defaults to 1");
        assert_eq!(component.unit, "pcs", "Missing unit defaults to pcs");
    }
}

#[test]
fn test_csv_rows_without_name_are_skipped() {
    let csv = source(
        SourceType::BomFile,
        "Item,Quantity\nMotor,2\n,4\n ,1",
        "bom.csv",
        0.9,
    );
    let components = process_sources(&[csv], &BomConfig::default());
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "Motor");
}

#[test]
fn test_markdown_bullet_with_multiplier_and_file_reference() {
    let markdown = source(
        SourceType::ReadmeMaterials,
        "* 2x Ear tube (eartube.stl)",
        "README.md",
        0.7,
    );
    let components = process_sources(&[markdown], &BomConfig::default());

    assert_eq!(components.len(), 1);
    let component = &components[0];
    assert_eq!(component.name, "Ear tube");
    assert_eq!(component.quantity, 2.0);
    assert_eq!(component.unit, "pcs");
    assert_eq!(
        component.metadata.file_reference.as_deref(),
        Some("eartube.stl")
    );
}

#[test]
fn test_markdown_plain_bullet_defaults_quantity() {
    let markdown = source(
        SourceType::ReadmeMaterials,
        "- Speaker mount\n- 3 Rubber feet\nSome prose line that is ignored.",
        "README.md",
        0.6,
    );
    let components = process_sources(&[markdown], &BomConfig::default());

    assert_eq!(components.len(), 2);
    assert_eq!(components[0].name, "Speaker mount");
    assert_eq!(components[0].quantity, 1.0);
    assert_eq!(components[1].name, "Rubber feet");
    assert_eq!(components[1].quantity, 3.0);
}

#[test]
fn test_markdown_numbered_list_and_short_names_rejected() {
    let markdown = source(
        SourceType::AssemblyGuide,
        "1. 4x M3 standoff\n2) Base plate\n- x\n- **Frame** with `markdown` noise",
        "docs/assembly.md",
        0.5,
    );
    let components = process_sources(&[markdown], &BomConfig::default());

    let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["M3 standoff", "Base plate", "Frame with markdown noise"]);
    assert_eq!(components[0].quantity, 4.0);
    assert_eq!(components[1].quantity, 1.0);
}

#[test]
fn test_json_components_collection() {
    let json = source(
        SourceType::BomFile,
        r#"{"components":[{"name":"Battery","qty":1}]}"#,
        "bom.json",
        0.9,
    );
    let components = process_sources(&[json], &BomConfig::default());

    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "Battery");
    assert_eq!(components[0].quantity, 1.0);
    assert_eq!(components[0].unit, "pcs");
}

#[test]
fn test_json_alias_resolution_and_extra_keys_preserved() {
    let json = source(
        SourceType::BomFile,
        r#"{"parts":[{"item":"Stepper motor","count":"2","uom":"pcs","supplier":"ACME","sku":"SM-17"}]}"#,
        "bom.json",
        0.9,
    );
    let components = process_sources(&[json], &BomConfig::default());

    assert_eq!(components.len(), 1);
    let component = &components[0];
    assert_eq!(component.name, "Stepper motor");
    assert_eq!(component.quantity, 2.0);
    assert_eq!(component.unit, "pcs");
    assert_eq!(
        component.metadata.extra.get("supplier"),
        Some(&serde_json::json!("ACME"))
    );
    assert_eq!(
        component.metadata.extra.get("sku"),
        Some(&serde_json::json!("SM-17"))
    );
}

#[test]
fn test_json_descends_one_level_into_nested_collection() {
    let json = source(
        SourceType::BomFile,
        r#"{"bom":{"items":[{"name":"Bearing","quantity":8}]}}"#,
        "bom.json",
        0.9,
    );
    let components = process_sources(&[json], &BomConfig::default());
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "Bearing");
    assert_eq!(components[0].quantity, 8.0);
}

#[test]
fn test_json_map_of_objects_is_treated_as_component_list() {
    let json = source(
        SourceType::BomFile,
        r#"{"frame":{"name":"Frame","quantity":1},"lid":{"name":"Lid","quantity":1}}"#,
        "bom.json",
        0.9,
    );
    let mut names: Vec<String> = process_sources(&[json], &BomConfig::default())
        .into_iter()
        .map(|c| c.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Frame", "Lid"]);
}

#[test]
fn test_json_sub_components_are_parsed_recursively() {
    let json = source(
        SourceType::BomFile,
        r#"{"components":[{"name":"Gearbox","quantity":1,"sub_components":[{"name":"Gear","quantity":4}]}]}"#,
        "bom.json",
        0.9,
    );
    let components = process_sources(&[json], &BomConfig::default());
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].sub_components.len(), 1);
    assert_eq!(components[0].sub_components[0].name, "Gear");
    assert_eq!(components[0].sub_components[0].quantity, 4.0);
}

#[test]
fn test_yaml_document_parses() {
    let yaml = source(
        SourceType::BomFile,
        "materials:\n  - name: Plywood sheet\n    quantity: 2\n    unit: pcs\n  - name: Wood glue\n    amount: 1",
        "materials.yaml",
        0.9,
    );
    let components = process_sources(&[yaml], &BomConfig::default());
    assert_eq!(components.len(), 2);
    assert_eq!(components[0].name, "Plywood sheet");
    assert_eq!(components[1].name, "Wood glue");
    assert_eq!(components[1].quantity, 1.0);
}

#[test]
fn test_undecodable_json_falls_back_to_markdown() {
    let broken = source(
        SourceType::BomFile,
        "{not valid json\n- 2x Spacer ring\n- Retaining clip",
        "bom.json",
        0.9,
    );
    let components = process_sources(&[broken], &BomConfig::default());

    let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Spacer ring", "Retaining clip"],
        "Markdown fallback should parse the same raw text"
    );
    assert_eq!(components[0].quantity, 2.0);
}

#[test]
fn test_json_without_component_collection_falls_back() {
    let json = source(
        SourceType::BomFile,
        "{\"title\": \"not a bom\"}\n* 1x Hinge",
        "bom.json",
        0.9,
    );
    let components = process_sources(&[json], &BomConfig::default());
    // The document decodes as a single JSON value only up to the first line;
    // decode failure of the full text triggers the markdown fallback.
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "Hinge");
}

#[test]
fn test_deduplication_is_case_and_trim_insensitive() {
    let readme = source(
        SourceType::ReadmeMaterials,
        "- Screw \n- Washer",
        "README.md",
        0.6,
    );
    let csv = source(SourceType::BomFile, "Item,Quantity\nscrew,10", "bom.csv", 0.9);
    let components = process_sources(&[readme, csv], &BomConfig::default());

    assert_eq!(components.len(), 2, "Screw and screw must collapse");
    let screw = components
        .iter()
        .find(|c| c.dedup_key() == "screw")
        .expect("screw survives deduplication");
    assert_eq!(
        screw.metadata.confidence, 0.9,
        "Higher-confidence CSV duplicate wins"
    );
    assert_eq!(screw.quantity, 10.0);
}

#[test]
fn test_deduplication_tie_keeps_first_seen() {
    let first = source(SourceType::ReadmeMaterials, "- Bracket", "README.md", 0.7);
    let second = source(
        SourceType::Documentation,
        "- bracket",
        "docs/build.md",
        0.7,
    );
    let components = process_sources(&[first, second], &BomConfig::default());

    assert_eq!(components.len(), 1);
    assert_eq!(
        components[0].metadata.file_path, "README.md",
        "Equal confidence keeps the first-seen component"
    );
}
