use std::collections::HashMap;

use okh_gen::bom::collector::collect;
use okh_gen::bom::{BomSource, BomSourceError, SourceType};
use okh_gen::config::BomConfig;
use okh_gen::project::{DocumentationEntry, ProjectData, ProjectFile};

fn project_with_files(files: Vec<(&str, &str)>) -> ProjectData {
    ProjectData {
        platform: "github".to_string(),
        url: "https://github.com/acme/widget".to_string(),
        metadata: HashMap::new(),
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

const README_WITH_MATERIALS: &str = "\
# Widget

A desktop widget you can build at home.

## Materials

* 2x Ear tube (eartube.stl)
* 1x Speaker mount
* 4 M3 screws

## Assembly

Follow the steps in the assembly guide.
";

#[test]
fn test_materials_section_is_detected_and_scored() {
    let project = project_with_files(vec![("README.md", README_WITH_MATERIALS)]);
    let sources = collect(&project, &BomConfig::default());

    let materials = sources
        .iter()
        .find(|s| s.source_type == SourceType::ReadmeMaterials)
        .expect("materials section detected");
    assert!(
        materials.confidence > 0.4,
        "Section confidence {} must clear the detection threshold",
        materials.confidence
    );
    assert!(materials.raw_content.contains("Ear tube"));
    assert_eq!(materials.file_path, "README.md");
}

#[test]
fn test_license_and_image_files_are_not_scanned() {
    let project = project_with_files(vec![
        (
            "LICENSE.md",
            "## Materials\n\n* 2x Things that look like parts\n* 1x But live in a license file",
        ),
        ("photos/build.png", "binary-ish"),
    ]);
    let sources = collect(&project, &BomConfig::default());
    assert!(
        sources.is_empty(),
        "License and image files must never produce sources, got {:?}",
        sources.iter().map(|s| &s.file_path).collect::<Vec<_>>()
    );
}

#[test]
fn test_dedicated_csv_bom_file_gets_structure_boost() {
    let project = project_with_files(vec![(
        "bom.csv",
        "Item,Quantity,Unit\nResistor,10,pcs\nLED,5,pcs",
    )]);
    let sources = collect(&project, &BomConfig::default());

    assert_eq!(sources.len(), 1);
    let source = &sources[0];
    assert_eq!(source.source_type, SourceType::BomFile);
    assert!(
        (source.confidence - 0.9).abs() < 1e-9,
        "Baseline 0.8 plus CSV structure boost expected, got {}",
        source.confidence
    );
    assert_eq!(source.metadata.get("format").map(String::as_str), Some("csv"));
}

#[test]
fn test_dedicated_bom_file_confidence_is_capped() {
    // Structured format boost plus content-quality boost would exceed the cap.
    let content = "components:\n  - name: Motor\n    quantity: 2 pcs\n  - name: Driver\n    quantity: 1 pcs\n  - name: Frame\n    quantity: 4 pcs\n";
    let project = project_with_files(vec![("materials.yaml", content)]);
    let sources = collect(&project, &BomConfig::default());

    assert_eq!(sources.len(), 1);
    assert!(
        sources[0].confidence <= 0.95,
        "Dedicated file confidence {} must not exceed the cap",
        sources[0].confidence
    );
}

#[test]
fn test_fallback_scan_catches_prose_materials_heading() {
    // No quantities and no list structure: the weighted scorer rejects this,
    // the regex fallback still finds the heading.
    let readme = "# Widget\n\n## Materials\n\nSee the supplier page for the full list.\n";
    let project = project_with_files(vec![("README.md", readme)]);
    let config = BomConfig::default();
    let sources = collect(&project, &config);

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source_type, SourceType::ReadmeMaterials);
    assert!(
        (sources[0].confidence - config.readme_fallback_cap).abs() < 1e-9,
        "Fallback README sources use the README ceiling"
    );
}

#[test]
fn test_fallback_scan_covers_documentation_entries() {
    let mut project = project_with_files(vec![]);
    project.documentation.push(DocumentationEntry {
        title: "Build guide".to_string(),
        path: "docs/build.md".to_string(),
        content: "## Materials\n\nEverything ships in the kit.\n".to_string(),
    });
    let config = BomConfig::default();
    let sources = collect(&project, &config);

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source_type, SourceType::Documentation);
    assert!(
        (sources[0].confidence - config.doc_fallback_cap).abs() < 1e-9,
        "Fallback documentation sources use the documentation ceiling"
    );
}

#[test]
fn test_assembly_heading_classifies_as_assembly_guide() {
    let content = "\
## Assembly materials

* 2x Hinge bracket
* 4x M4 bolt
* 1x Back panel
";
    let project = project_with_files(vec![("docs/assembly.md", content)]);
    let sources = collect(&project, &BomConfig::default());

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source_type, SourceType::AssemblyGuide);
}

#[test]
fn test_source_invariants_are_rejected_at_construction() {
    assert!(matches!(
        BomSource::new(SourceType::BomFile, "   ", "bom.csv", 0.8),
        Err(BomSourceError::EmptyContent)
    ));
    assert!(matches!(
        BomSource::new(SourceType::BomFile, "Item,Qty", "  ", 0.8),
        Err(BomSourceError::EmptyFilePath)
    ));
    assert!(matches!(
        BomSource::new(SourceType::BomFile, "Item,Qty", "bom.csv", 1.5),
        Err(BomSourceError::ConfidenceOutOfRange(_))
    ));
    assert!(BomSource::new(SourceType::BomFile, "Item,Qty", "bom.csv", 0.8).is_ok());
}
