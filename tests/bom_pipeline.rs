use std::collections::HashMap;

use okh_gen::bom::run_pipeline;
use okh_gen::config::BomConfig;
use okh_gen::project::{ProjectData, ProjectFile};

fn project(files: Vec<(&str, &str)>) -> ProjectData {
    ProjectData {
        platform: "github".to_string(),
        url: "https://github.com/acme/earmuffs".to_string(),
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

const README: &str = "\
# Earmuffs

Printable hearing protection.

## Materials

* 2x Ear tube (eartube.stl)
* 1x Speaker mount
* 4 M3 screws
";

const BOM_CSV: &str = "Item,Quantity,Unit\nEar tube,2,pcs\nFoam pad,6,pcs";

#[test]
fn test_readme_and_csv_merge_without_duplicates() {
    let snapshot = project(vec![("README.md", README), ("bom.csv", BOM_CSV)]);
    let bom = run_pipeline(&snapshot, &BomConfig::default()).expect("pipeline yields a BOM");

    let mut names: Vec<String> = bom
        .components
        .iter()
        .map(|c| c.dedup_key())
        .collect();
    names.sort();
    let mut unique = names.clone();
    unique.dedup();
    assert_eq!(names, unique, "No duplicate names may survive");
    assert_eq!(bom.components.len(), 4);

    let ear_tube = bom
        .components
        .iter()
        .find(|c| c.dedup_key() == "ear tube")
        .expect("shared component survives");
    assert_eq!(
        ear_tube.metadata.source, "bom_file",
        "The CSV duplicate outranks the README bullet"
    );
    assert!(
        ear_tube.metadata.confidence > 0.8,
        "CSV-sourced metadata carries the boosted confidence"
    );
}

#[test]
fn test_pipeline_counts_and_confidence() {
    let snapshot = project(vec![("README.md", README), ("bom.csv", BOM_CSV)]);
    let bom = run_pipeline(&snapshot, &BomConfig::default()).expect("pipeline yields a BOM");

    assert!(bom.metadata.final_count <= bom.metadata.source_count);
    assert_eq!(bom.metadata.final_count, bom.components.len());
    let overall = bom.overall_confidence().expect("non-empty BOM has confidence");
    assert!((0.0..=1.0).contains(&overall));
}

#[test]
fn test_pipeline_returns_none_for_projects_without_bom_evidence() {
    let snapshot = project(vec![(
        "README.md",
        "# Earmuffs\n\nPrintable hearing protection.\n",
    )]);
    assert!(run_pipeline(&snapshot, &BomConfig::default()).is_none());
}
