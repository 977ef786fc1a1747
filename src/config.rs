//! Engine and BOM pipeline configuration.
//!
//! Every heuristic threshold the pipelines use is carried here as a tunable
//! value. The defaults are the constants the generation behaviour was
//! calibrated against; change them only with behavioural tests in hand.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contract::EngineError;

/// Strategy for running the enabled generation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Run layers in priority order, stopping once all required fields are
    /// present at sufficient confidence. Bounds cost by skipping expensive
    /// layers when cheap ones already satisfy the quality bar.
    #[default]
    Progressive,
    /// Run all enabled layers (concurrently) and merge everything.
    Full,
}

impl From<&str> for GenerationStrategy {
    fn from(s: &str) -> Self {
        match s {
            "Progressive" | "progressive" => GenerationStrategy::Progressive,
            "Full" | "full" => GenerationStrategy::Full,
            other => {
                warn!(
                    strategy = other,
                    "Unknown generation strategy, defaulting to Progressive"
                );
                GenerationStrategy::Progressive
            }
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub strategy: GenerationStrategy,
    /// Minimum confidence a required field must reach for the progressive
    /// strategy to consider it satisfied.
    #[serde(default = "default_min_field_confidence")]
    pub min_field_confidence: f64,
    /// Run the BOM normalization pipeline and attach its output.
    #[serde(default = "default_enable_bom")]
    pub enable_bom_normalization: bool,
    /// Tolerate layers that fail to initialise (e.g. an LLM layer without
    /// credentials) instead of refusing to construct the engine.
    #[serde(default)]
    pub allow_partial_layer_init: bool,
    /// Fields below this confidence are flagged in the quality report.
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
    /// Quality deduction per missing required field.
    #[serde(default = "default_missing_field_penalty")]
    pub missing_field_penalty: f64,
    #[serde(default)]
    pub bom: BomConfig,
}

/// BOM collector/processor/builder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomConfig {
    /// Sections scoring at or below this are discarded by the collector.
    #[serde(default = "default_section_detection_threshold")]
    pub section_detection_threshold: f64,
    /// Confidence assigned to the `bom` field when the built BOM carries no
    /// overall-confidence metric of its own.
    #[serde(default = "default_bom_confidence")]
    pub default_confidence: f64,
    /// Baseline confidence for dedicated BOM-named files.
    #[serde(default = "default_bom_file_baseline")]
    pub bom_file_baseline: f64,
    /// Ceiling for dedicated BOM-named files after format/content boosts.
    #[serde(default = "default_bom_file_cap")]
    pub bom_file_cap: f64,
    /// Confidence ceiling for the README fallback scan.
    #[serde(default = "default_readme_fallback_cap")]
    pub readme_fallback_cap: f64,
    /// Confidence ceiling for the generic-documentation fallback scan.
    #[serde(default = "default_doc_fallback_cap")]
    pub doc_fallback_cap: f64,
    /// Component names shorter than this (after trimming) are rejected.
    #[serde(default = "default_min_component_name_len")]
    pub min_component_name_len: usize,
}

fn default_min_field_confidence() -> f64 {
    0.7
}

fn default_enable_bom() -> bool {
    true
}

fn default_low_confidence_threshold() -> f64 {
    0.7
}

fn default_missing_field_penalty() -> f64 {
    0.1
}

fn default_section_detection_threshold() -> f64 {
    0.4
}

fn default_bom_confidence() -> f64 {
    0.8
}

fn default_bom_file_baseline() -> f64 {
    0.8
}

fn default_bom_file_cap() -> f64 {
    0.95
}

fn default_readme_fallback_cap() -> f64 {
    0.9
}

fn default_doc_fallback_cap() -> f64 {
    0.8
}

fn default_min_component_name_len() -> usize {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strategy: GenerationStrategy::default(),
            min_field_confidence: default_min_field_confidence(),
            enable_bom_normalization: default_enable_bom(),
            allow_partial_layer_init: false,
            low_confidence_threshold: default_low_confidence_threshold(),
            missing_field_penalty: default_missing_field_penalty(),
            bom: BomConfig::default(),
        }
    }
}

impl Default for BomConfig {
    fn default() -> Self {
        BomConfig {
            section_detection_threshold: default_section_detection_threshold(),
            default_confidence: default_bom_confidence(),
            bom_file_baseline: default_bom_file_baseline(),
            bom_file_cap: default_bom_file_cap(),
            readme_fallback_cap: default_readme_fallback_cap(),
            doc_fallback_cap: default_doc_fallback_cap(),
            min_component_name_len: default_min_component_name_len(),
        }
    }
}

impl EngineConfig {
    /// Reject configurations with out-of-range threshold values.
    pub fn validate(&self) -> Result<(), EngineError> {
        let unit_ranged = [
            ("min_field_confidence", self.min_field_confidence),
            ("low_confidence_threshold", self.low_confidence_threshold),
            ("missing_field_penalty", self.missing_field_penalty),
            (
                "bom.section_detection_threshold",
                self.bom.section_detection_threshold,
            ),
            ("bom.default_confidence", self.bom.default_confidence),
            ("bom.bom_file_baseline", self.bom.bom_file_baseline),
            ("bom.bom_file_cap", self.bom.bom_file_cap),
            ("bom.readme_fallback_cap", self.bom.readme_fallback_cap),
            ("bom.doc_fallback_cap", self.bom.doc_fallback_cap),
        ];
        for (name, value) in unit_ranged {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Configuration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.bom.bom_file_baseline > self.bom.bom_file_cap {
            return Err(EngineError::Configuration(format!(
                "bom.bom_file_baseline ({}) exceeds bom.bom_file_cap ({})",
                self.bom.bom_file_baseline, self.bom.bom_file_cap
            )));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            strategy = ?self.strategy,
            min_field_confidence = self.min_field_confidence,
            enable_bom_normalization = self.enable_bom_normalization,
            "Loaded EngineConfig"
        );
        debug!(?self, "EngineConfig loaded (full debug)");
    }
}
