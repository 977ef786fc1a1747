//! High-level pipeline: orchestrates extraction layers and fuses their
//! outputs into a manifest.
//!
//! This module provides the top-level orchestration logic for generating an
//! OKH manifest from a project snapshot. It implements a coordinated pipeline
//! that:
//!   - Runs the enabled extraction layers under the configured strategy
//!     (progressive early-termination or full concurrent fan-out)
//!   - Merges conflicting field candidates by confidence
//!   - Invokes the BOM normalization pipeline and derives secondary fields
//!     (materials classification, parts directory grouping)
//!   - Delegates quality assessment and returns a [`ManifestGeneration`]
//!
//! # Major Types
//! - [`GenerationEngine`]: one configured engine instance with its own metrics
//! - [`ManifestGeneration`]: output bundle for downstream serialization
//! - [`EngineMetrics`]: running request/latency/usage counters
//!
//! # Error Handling
//! A failing layer is logged and its contribution dropped; a failing BOM
//! pipeline merely suppresses the `bom`/`materials` fields. Only degenerate
//! input and broken configuration surface to the caller as [`EngineError`].
//!
//! # Concurrency
//! `generate_manifest` takes `&self`; metrics sit behind a mutex. Sharing one
//! engine across concurrent calls is safe but interleaves the moving-average
//! latency, so per-call metrics are approximate in that setup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::bom::{self, builder, BillOfMaterials};
use crate::config::{EngineConfig, GenerationStrategy};
use crate::contract::{
    BoxError, EngineError, FieldGeneration, FieldValue, GenerationLayer, GenerationSource,
    LayerResult, QualityAssessor, QualityReport, REQUIRED_FIELDS,
};
use crate::layers::{DirectLayer, HeuristicLayer};
use crate::project::ProjectData;
use crate::quality::DefaultQualityAssessor;

/// Outcome of constructing one layer; failed constructions are tolerated when
/// the configuration allows partial initialisation.
pub type LayerInit = Result<Box<dyn GenerationLayer>, BoxError>;

/// Aggregate result of one `generate_manifest` call.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestGeneration {
    pub platform: String,
    pub url: String,
    pub generated_fields: HashMap<String, FieldGeneration>,
    pub confidence_scores: HashMap<String, f64>,
    pub quality_report: QualityReport,
    pub missing_fields: Vec<String>,
    pub full_bom: Option<BillOfMaterials>,
}

/// Running counters for one engine instance.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Completed generation runs.
    pub requests: u64,
    /// Rejected or failed runs.
    pub failures: u64,
    /// Moving average over completed runs.
    pub average_latency_ms: f64,
    /// How often each layer contributed to a merge.
    pub layer_usage: HashMap<GenerationSource, u64>,
    /// Histogram of error kinds observed (layer failures, invalid input, ...).
    pub error_counts: HashMap<String, u64>,
}

pub struct GenerationEngine {
    config: EngineConfig,
    layers: Vec<Box<dyn GenerationLayer>>,
    assessor: Box<dyn QualityAssessor>,
    metrics: Mutex<EngineMetrics>,
}

impl GenerationEngine {
    /// Build an engine from initialised (or failed-to-initialise) layers.
    ///
    /// Failed initialisations are skipped with a warning when
    /// `allow_partial_layer_init` is set; otherwise they are fatal. An engine
    /// with zero usable layers is always a configuration error.
    pub fn new(config: EngineConfig, layer_inits: Vec<LayerInit>) -> Result<Self, EngineError> {
        config.validate()?;

        let mut layers: Vec<Box<dyn GenerationLayer>> = Vec::new();
        for init in layer_inits {
            match init {
                Ok(layer) => {
                    debug!(layer = %layer.source(), "Layer initialised");
                    layers.push(layer);
                }
                Err(e) if config.allow_partial_layer_init => {
                    warn!(error = %e, "Layer failed to initialise, continuing without it");
                }
                Err(e) => {
                    return Err(EngineError::Configuration(format!(
                        "layer failed to initialise: {e}"
                    )))
                }
            }
        }
        if layers.is_empty() {
            return Err(EngineError::Configuration(
                "no generation layers enabled".to_string(),
            ));
        }
        layers.sort_by_key(|layer| layer.source().priority());

        let assessor = Box::new(DefaultQualityAssessor::new(
            config.low_confidence_threshold,
            config.missing_field_penalty,
        ));
        Ok(GenerationEngine {
            config,
            layers,
            assessor,
            metrics: Mutex::new(EngineMetrics::default()),
        })
    }

    /// Engine over the two in-process layers (direct metadata + heuristics).
    pub fn with_default_layers(config: EngineConfig) -> Result<Self, EngineError> {
        GenerationEngine::new(
            config,
            vec![Ok(Box::new(DirectLayer)), Ok(Box::new(HeuristicLayer))],
        )
    }

    /// Replace the quality assessor.
    pub fn with_assessor(mut self, assessor: Box<dyn QualityAssessor>) -> Self {
        self.assessor = assessor;
        self
    }

    /// Snapshot of the engine's running metrics.
    pub fn metrics(&self) -> EngineMetrics {
        self.lock_metrics().clone()
    }

    /// Generate a manifest for one project snapshot.
    pub async fn generate_manifest(
        &self,
        project: &ProjectData,
    ) -> Result<ManifestGeneration, EngineError> {
        let started = Instant::now();

        if project.is_empty() {
            error!(url = %project.url, "[GEN] Rejecting degenerate project snapshot");
            self.note_failure("invalid_input");
            return Err(EngineError::InvalidInput(
                "project snapshot carries no metadata, files, documentation or raw content"
                    .to_string(),
            ));
        }

        info!(
            platform = %project.platform,
            url = %project.url,
            strategy = ?self.config.strategy,
            layers = self.layers.len(),
            "[GEN] Starting manifest generation"
        );

        let mut fields = match self.config.strategy {
            GenerationStrategy::Progressive => self.run_progressive(project).await,
            GenerationStrategy::Full => self.run_full(project).await,
        };

        let mut full_bom = None;
        if self.config.enable_bom_normalization {
            match bom::run_pipeline(project, &self.config.bom) {
                Some(bill) => {
                    self.attach_bom(&mut fields, &bill);
                    full_bom = Some(bill);
                }
                None => debug!("[GEN] BOM pipeline yielded no bill of materials"),
            }
        }

        self.derive_parts_fields(project, &mut fields);

        let missing_fields: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| !fields.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        let confidence_scores: HashMap<String, f64> = fields
            .iter()
            .map(|(name, generation)| (name.clone(), generation.confidence))
            .collect();

        let quality_report = self.assessor.generate_quality_report(
            &fields,
            &confidence_scores,
            &missing_fields,
            &REQUIRED_FIELDS,
        );

        self.note_success(started.elapsed());
        info!(
            fields = fields.len(),
            missing = missing_fields.len(),
            quality = quality_report.overall_quality,
            "[GEN] Manifest generation complete"
        );

        Ok(ManifestGeneration {
            platform: project.platform.clone(),
            url: project.url.clone(),
            generated_fields: fields,
            confidence_scores,
            quality_report,
            missing_fields,
            full_bom,
        })
    }

    /// Run layers in priority order, stopping as soon as every required field
    /// is present at the configured minimum confidence.
    async fn run_progressive(&self, project: &ProjectData) -> HashMap<String, FieldGeneration> {
        let mut merged = HashMap::new();
        for layer in &self.layers {
            if self.required_satisfied(&merged) {
                info!(
                    next_layer = %layer.source(),
                    "[GEN] Required fields satisfied, skipping remaining layers"
                );
                break;
            }
            let source = layer.source();
            debug!(layer = %source, "[GEN] Running layer");
            let outcome = layer.process(project).await;
            self.absorb(source, outcome, &mut merged);
        }
        merged
    }

    /// Fan out all layers concurrently, then merge sequentially in fixed
    /// priority order so the result is independent of completion order.
    async fn run_full(&self, project: &ProjectData) -> HashMap<String, FieldGeneration> {
        let invocations = self.layers.iter().map(|layer| {
            let source = layer.source();
            async move { (source, layer.process(project).await) }
        });
        let outcomes = futures::future::join_all(invocations).await;

        let mut merged = HashMap::new();
        for (source, outcome) in outcomes {
            self.absorb(source, outcome, &mut merged);
        }
        merged
    }

    /// Merge one layer's outcome into the accumulator, isolating failure.
    fn absorb(
        &self,
        source: GenerationSource,
        outcome: Result<LayerResult, BoxError>,
        merged: &mut HashMap<String, FieldGeneration>,
    ) {
        match outcome {
            Ok(result) => {
                for line in &result.processing_log {
                    debug!(layer = %source, message = %line, "[GEN] Layer log");
                }
                for err in &result.errors {
                    warn!(layer = %source, error = %err, "[GEN] Layer reported recoverable error");
                }
                let contributed = result.fields.len();
                for (name, generation) in result.fields {
                    merge_field(merged, name, generation);
                }
                self.note_layer_use(source);
                debug!(layer = %source, fields = contributed, "[GEN] Layer contribution merged");
            }
            Err(e) => {
                warn!(layer = %source, error = %e, "[GEN] Layer failed, dropping its contribution");
                self.note_error(&format!("layer_{source}"));
            }
        }
    }

    fn required_satisfied(&self, merged: &HashMap<String, FieldGeneration>) -> bool {
        REQUIRED_FIELDS.iter().all(|field| {
            merged
                .get(*field)
                .map_or(false, |g| g.confidence >= self.config.min_field_confidence)
        })
    }

    /// Attach the BOM as a field and derive `materials` from it. The derived
    /// materials list overrides any earlier `materials` candidate.
    fn attach_bom(&self, fields: &mut HashMap<String, FieldGeneration>, bill: &BillOfMaterials) {
        let confidence = bill
            .overall_confidence()
            .unwrap_or(self.config.bom.default_confidence);

        if let Some(materials) = classify_materials(bill) {
            info!(materials = materials.len(), "[GEN] Derived materials from BOM");
            fields.insert(
                "materials".to_string(),
                FieldGeneration {
                    value: FieldValue::TextList(materials),
                    confidence,
                    source_layer: GenerationSource::BomNormalization,
                    generation_method: "bom_material_classification".to_string(),
                    raw_source: Some(bill.name.clone()),
                },
            );
        }

        fields.insert(
            "bom".to_string(),
            FieldGeneration {
                value: FieldValue::Bom(bill.clone()),
                confidence,
                source_layer: GenerationSource::BomNormalization,
                generation_method: builder::GENERATION_METHOD.to_string(),
                raw_source: None,
            },
        );
    }

    /// Group files under a conventional parts directory into `parts` and
    /// `sub_parts` candidates, merged under the usual confidence rule.
    fn derive_parts_fields(
        &self,
        project: &ProjectData,
        fields: &mut HashMap<String, FieldGeneration>,
    ) {
        let Some((parts, sub_parts)) = derive_parts(project) else {
            return;
        };
        for (name, value) in [("parts", parts), ("sub_parts", sub_parts)] {
            let Some(value) = value else { continue };
            merge_field(
                fields,
                name.to_string(),
                FieldGeneration {
                    value: FieldValue::Structured(value),
                    confidence: 0.7,
                    source_layer: GenerationSource::Heuristic,
                    generation_method: "parts_directory_scan".to_string(),
                    raw_source: Some("parts/".to_string()),
                },
            );
        }
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, EngineMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn note_success(&self, elapsed: Duration) {
        let mut metrics = self.lock_metrics();
        metrics.requests += 1;
        let latency = elapsed.as_secs_f64() * 1000.0;
        let n = metrics.requests as f64;
        metrics.average_latency_ms += (latency - metrics.average_latency_ms) / n;
    }

    fn note_failure(&self, kind: &str) {
        let mut metrics = self.lock_metrics();
        metrics.failures += 1;
        *metrics.error_counts.entry(kind.to_string()).or_default() += 1;
    }

    fn note_error(&self, kind: &str) {
        let mut metrics = self.lock_metrics();
        *metrics.error_counts.entry(kind.to_string()).or_default() += 1;
    }

    fn note_layer_use(&self, source: GenerationSource) {
        let mut metrics = self.lock_metrics();
        *metrics.layer_usage.entry(source).or_default() += 1;
    }
}

/// The merge rule: a new field is inserted; an existing field is replaced
/// only by a strictly more confident candidate, so ties keep whichever was
/// applied first.
fn merge_field(
    merged: &mut HashMap<String, FieldGeneration>,
    name: String,
    candidate: FieldGeneration,
) {
    match merged.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(candidate);
        }
        Entry::Occupied(mut slot) => {
            if candidate.confidence > slot.get().confidence {
                debug!(
                    field = %slot.key(),
                    old_layer = %slot.get().source_layer,
                    new_layer = %candidate.source_layer,
                    "[GEN] Field candidate replaced by higher confidence"
                );
                slot.insert(candidate);
            }
        }
    }
}

/// Ordered material/category pattern table. Specific materials precede
/// generic categories; the first matching row wins.
static MATERIAL_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let table: &[(&str, &str)] = &[
        (r"(?i)\bpla\b", "PLA"),
        (r"(?i)\babs\b", "ABS"),
        (r"(?i)\bpetg\b", "PETG"),
        (r"(?i)\bbrass\b", "Brass"),
        (r"(?i)\b(?:stainless\s+)?steel\b", "Steel"),
        (r"(?i)\balumin(?:um|ium)\b", "Aluminum"),
        (r"(?i)\bcopper\b", "Copper"),
        (r"(?i)\b(?:plywood|wood(?:en)?)\b", "Wood"),
        (r"(?i)\bacrylic\b", "Acrylic"),
        (r"(?i)\bnylon\b", "Nylon"),
        (r"(?i)\bsilicone\b", "Silicone"),
        (r"(?i)\brubber\b", "Rubber"),
        (
            r"(?i)\b(?:resistor|capacitor|led|diode|transistor|pcb|arduino|raspberry|sensor|battery|motor|servo|esp32|microcontroller)s?\b",
            "Electronics",
        ),
        (
            r"(?i)\b(?:screw|bolt|nut|washer|rivet|standoff|fastener)s?\b",
            "Fasteners",
        ),
        (r"(?i)\b(?:cable|wire|cord|connector)s?\b", "Cables"),
        (r"(?i)\b(?:lens|mirror|optic(?:s|al)?|glass)\b", "Optics"),
    ];
    table
        .iter()
        .map(|(pattern, label)| (Regex::new(pattern).unwrap(), *label))
        .collect()
});

/// Classify component names into an ordered, deduplicated material list.
fn classify_materials(bill: &BillOfMaterials) -> Option<Vec<String>> {
    let mut materials: Vec<String> = Vec::new();
    for component in &bill.components {
        let label = MATERIAL_PATTERNS
            .iter()
            .find(|(re, _)| re.is_match(&component.name))
            .map(|(_, label)| *label);
        if let Some(label) = label {
            if !materials.iter().any(|m| m == label) {
                materials.push(label.to_string());
            }
        }
    }
    if materials.is_empty() {
        None
    } else {
        Some(materials)
    }
}

/// Subdirectory names under the parts root that count as primary parts.
const PART_CATEGORIES: &[&str] = &["electronics", "optics", "printed"];

/// Group files under a conventional `parts/` directory by immediate
/// subdirectory. Returns `(parts, sub_parts)` as structured JSON values.
fn derive_parts(
    project: &ProjectData,
) -> Option<(Option<serde_json::Value>, Option<serde_json::Value>)> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut loose: Vec<String> = Vec::new();

    for file in &project.files {
        let segments: Vec<&str> = file.path.split('/').collect();
        let Some(root_idx) = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case("parts"))
        else {
            continue;
        };
        let below = &segments[root_idx + 1..];
        match below {
            [] => {}
            [_file] => loose.push(file.path.clone()),
            [subdir, ..] => groups
                .entry(subdir.to_string())
                .or_default()
                .push(file.path.clone()),
        }
    }

    if groups.is_empty() && loose.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut sub_parts = Vec::new();
    for (subdir, files) in groups {
        let entry = serde_json::json!({ "name": subdir, "files": files });
        if PART_CATEGORIES.contains(&subdir.to_lowercase().as_str()) {
            parts.push(entry);
        } else {
            sub_parts.push(entry);
        }
    }
    if !loose.is_empty() {
        sub_parts.push(serde_json::json!({ "name": "Individual Parts", "files": loose }));
    }

    let parts = (!parts.is_empty()).then(|| serde_json::Value::Array(parts));
    let sub_parts = (!sub_parts.is_empty()).then(|| serde_json::Value::Array(sub_parts));
    Some((parts, sub_parts))
}
