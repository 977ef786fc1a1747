//! # contract: interfaces between the engine and its collaborators
//!
//! This module defines the traits and plain data types that cross the core's
//! boundary: the [`GenerationLayer`] capability every extraction layer
//! implements, the [`QualityAssessor`] consumed for report generation, and the
//! field/value types the engine merges.
//!
//! ## Interface & Extensibility
//! - Implement [`GenerationLayer`] to plug in a new extraction layer (NLP, LLM,
//!   or anything else). All methods are async and return boxed error types.
//! - A layer must absorb recoverable failures into [`LayerResult::errors`];
//!   returning `Err` means the whole invocation failed and its contribution is
//!   dropped by the engine.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests (enabled by the
//!   `test-export-mocks` feature).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::bom::BillOfMaterials;
use crate::project::ProjectData;

/// Uniform boxed error used at all async trait seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The manifest fields a generation run must fill before it is considered
/// complete. Progressive generation terminates once all of these are present
/// at sufficient confidence.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "title",
    "version",
    "license",
    "licensor",
    "documentation_language",
    "function",
];

/// Capability of the layer (or derivation) that produced a field candidate.
///
/// The progressive strategy runs layers in ascending [`priority`] order, so
/// cheap layers always get a chance to satisfy a field before expensive ones
/// are invoked.
///
/// [`priority`]: GenerationSource::priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationSource {
    Direct,
    Heuristic,
    Nlp,
    Llm,
    BomNormalization,
    UserEdit,
}

impl GenerationSource {
    /// Fixed execution order for the progressive strategy. Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            GenerationSource::Direct => 0,
            GenerationSource::Heuristic => 1,
            GenerationSource::Nlp => 2,
            GenerationSource::Llm => 3,
            GenerationSource::BomNormalization => 4,
            GenerationSource::UserEdit => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationSource::Direct => "direct",
            GenerationSource::Heuristic => "heuristic",
            GenerationSource::Nlp => "nlp",
            GenerationSource::Llm => "llm",
            GenerationSource::BomNormalization => "bom_normalization",
            GenerationSource::UserEdit => "user_edit",
        }
    }
}

impl std::fmt::Display for GenerationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of value shapes a manifest field can take.
///
/// Untagged: a `Structured` value accepts any JSON shape, so it must stay the
/// last variant for deserialization to resolve the specific shapes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    Bom(BillOfMaterials),
    Structured(serde_json::Value),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::TextList(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bom(&self) -> Option<&BillOfMaterials> {
        match self {
            FieldValue::Bom(bom) => Some(bom),
            _ => None,
        }
    }
}

/// One candidate value for one manifest field, with provenance and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldGeneration {
    pub value: FieldValue,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub source_layer: GenerationSource,
    /// Short machine identifier of the technique that produced the value,
    /// e.g. "platform_metadata" or "readme_heuristics".
    pub generation_method: String,
    /// Where the value came from (file path, metadata key, ...), for audit.
    pub raw_source: Option<String>,
}

impl FieldGeneration {
    pub fn text(
        value: impl Into<String>,
        confidence: f64,
        source_layer: GenerationSource,
        generation_method: impl Into<String>,
    ) -> Self {
        FieldGeneration {
            value: FieldValue::Text(value.into()),
            confidence,
            source_layer,
            generation_method: generation_method.into(),
            raw_source: None,
        }
    }

    pub fn with_raw_source(mut self, raw_source: impl Into<String>) -> Self {
        self.raw_source = Some(raw_source.into());
        self
    }
}

/// Ephemeral result of one layer invocation.
#[derive(Debug, Clone, Default)]
pub struct LayerResult {
    pub fields: HashMap<String, FieldGeneration>,
    pub confidence_scores: HashMap<String, f64>,
    pub processing_log: Vec<String>,
    pub errors: Vec<String>,
}

impl LayerResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field candidate, keeping the confidence index in sync.
    pub fn add_field(&mut self, name: impl Into<String>, generation: FieldGeneration) {
        let name = name.into();
        self.confidence_scores
            .insert(name.clone(), generation.confidence);
        self.fields.insert(name, generation);
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.processing_log.push(message.into());
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Capability contract for an extraction layer.
///
/// Implementors must not panic for recoverable failures: either absorb them
/// into [`LayerResult::errors`], or return `Err` to drop the whole
/// contribution. The engine isolates a failing layer from its siblings.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GenerationLayer: Send + Sync {
    /// The capability recorded on every field this layer produces. Fixed per
    /// implementation.
    fn source(&self) -> GenerationSource;

    /// Extract field candidates from the project snapshot.
    async fn process(&self, project: &ProjectData) -> Result<LayerResult, BoxError>;
}

/// Quality report over a finished generation run. Produced by a
/// [`QualityAssessor`]; pure function of its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Aggregate quality in [0, 1]; required fields are double-weighted and
    /// each missing required field applies a penalty.
    pub overall_quality: f64,
    pub required_fields_complete: bool,
    pub missing_required_fields: Vec<String>,
    /// Generated fields whose confidence fell below the configured cutoff.
    pub low_confidence_fields: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Turns merged fields into a [`QualityReport`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait QualityAssessor: Send + Sync {
    fn generate_quality_report(
        &self,
        generated_fields: &HashMap<String, FieldGeneration>,
        confidence_scores: &HashMap<String, f64>,
        missing_fields: &[String],
        required_fields: &[&'static str],
    ) -> QualityReport;
}

/// Fatal errors crossing the core's public boundary. Everything else is
/// absorbed into logs, partial results, or count discrepancies.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
