//! BOM normalization pipeline: Collector → Processor → Builder.
//!
//! The pipeline extracts a Bill of Materials from heterogeneous, semi-structured
//! text scattered across a project snapshot:
//!   - [`collector`] scans files and documentation, emitting scored [`BomSource`]s
//!   - [`processor`] parses each source into [`Component`]s (CSV, JSON, YAML,
//!     markdown bullet lists) and deduplicates across sources
//!   - [`builder`] validates components and assembles the final
//!     [`BillOfMaterials`]
//!
//! # Error Handling
//! No stage fails the run. Malformed sources are omitted, undecodable
//! structured text falls back to markdown parsing, and invalid components are
//! excluded (visible as `source_count` vs `final_count` in the BOM metadata).
//!
//! # Navigation
//! - Main entrypoint: [`run_pipeline`]
//! - Supporting types: [`BomSource`], [`Component`], [`BillOfMaterials`]

pub mod builder;
pub mod collector;
pub mod processor;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::BomConfig;
use crate::project::ProjectData;

/// Where a candidate BOM region was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    ReadmeMaterials,
    ReadmeBom,
    BomFile,
    Documentation,
    AssemblyGuide,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::ReadmeMaterials => "readme_materials",
            SourceType::ReadmeBom => "readme_bom",
            SourceType::BomFile => "bom_file",
            SourceType::Documentation => "documentation",
            SourceType::AssemblyGuide => "assembly_guide",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invariant violations rejected at [`BomSource`] construction.
#[derive(Debug, thiserror::Error)]
pub enum BomSourceError {
    #[error("source content must not be empty")]
    EmptyContent,
    #[error("source file path must not be empty")]
    EmptyFilePath,
    #[error("source confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// One scored candidate BOM region, ready for parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomSource {
    pub source_type: SourceType,
    pub raw_content: String,
    pub file_path: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl BomSource {
    /// Construct a source, rejecting empty content, empty path, or
    /// out-of-range confidence.
    pub fn new(
        source_type: SourceType,
        raw_content: impl Into<String>,
        file_path: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, BomSourceError> {
        let raw_content = raw_content.into();
        let file_path = file_path.into();
        if raw_content.trim().is_empty() {
            return Err(BomSourceError::EmptyContent);
        }
        if file_path.trim().is_empty() {
            return Err(BomSourceError::EmptyFilePath);
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(BomSourceError::ConfidenceOutOfRange(confidence));
        }
        Ok(BomSource {
            source_type,
            raw_content,
            file_path,
            confidence,
            metadata: HashMap::new(),
        })
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Provenance carried on every parsed component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// Source type the component was parsed from.
    pub source: String,
    pub file_path: String,
    pub confidence: f64,
    /// File mentioned next to the component, e.g. an STL referenced in a bullet.
    #[serde(default)]
    pub file_reference: Option<String>,
    /// Non-standard keys from structured sources, preserved verbatim.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ComponentMetadata {
    pub fn from_source(source: &BomSource) -> Self {
        ComponentMetadata {
            source: source.source_type.to_string(),
            file_path: source.file_path.clone(),
            confidence: source.confidence,
            file_reference: None,
            extra: HashMap::new(),
        }
    }
}

/// One BOM line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub sub_components: Vec<Component>,
    pub metadata: ComponentMetadata,
}

impl Component {
    /// Create a component with a fresh id. An empty unit defaults to "pcs".
    pub fn new(
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        metadata: ComponentMetadata,
    ) -> Self {
        let unit = unit.into();
        Component {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            quantity,
            unit: if unit.trim().is_empty() {
                "pcs".to_string()
            } else {
                unit
            },
            sub_components: Vec::new(),
            metadata,
        }
    }

    /// Deduplication key: case-insensitive, whitespace-trimmed name.
    pub fn dedup_key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// Metadata describing one BOM build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomMetadata {
    /// ISO-8601 UTC build timestamp.
    pub generated_at: String,
    /// Component count before validation.
    pub source_count: usize,
    /// Component count after validation.
    pub final_count: usize,
    pub generation_method: String,
    /// Mean component confidence; absent for an empty BOM.
    #[serde(default)]
    pub overall_confidence: Option<f64>,
}

/// The final, immutable Bill of Materials for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub id: String,
    pub name: String,
    pub components: Vec<Component>,
    pub metadata: BomMetadata,
}

impl PartialEq for BillOfMaterials {
    // Identity equality on the generated id.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BillOfMaterials {
    pub fn overall_confidence(&self) -> Option<f64> {
        self.metadata.overall_confidence
    }
}

/// Run the full pipeline over a project snapshot. Returns `None` when the
/// collector finds no candidate sources at all; otherwise always produces a
/// BOM (possibly with zero surviving components).
pub fn run_pipeline(project: &ProjectData, config: &BomConfig) -> Option<BillOfMaterials> {
    info!(url = %project.url, "[BOM] Starting BOM normalization pipeline");

    let sources = collector::collect(project, config);
    if sources.is_empty() {
        debug!(url = %project.url, "[BOM] No candidate BOM sources discovered");
        return None;
    }
    info!(sources = sources.len(), "[BOM] Collected candidate sources");

    let components = processor::process_sources(&sources, config);
    info!(
        components = components.len(),
        "[BOM] Parsed and deduplicated components"
    );

    let bom = builder::build(components, &project.display_name());
    info!(
        final_count = bom.metadata.final_count,
        source_count = bom.metadata.source_count,
        "[BOM] Built bill of materials"
    );
    Some(bom)
}
