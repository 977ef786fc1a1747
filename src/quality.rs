//! Default quality assessment over a finished generation run.

use std::collections::HashMap;
use tracing::debug;

use crate::contract::{FieldGeneration, QualityAssessor, QualityReport};

/// Scores a merged field set: confidence-weighted mean with required fields
/// double-weighted, a flat penalty per missing required field, and a list of
/// fields below the low-confidence cutoff.
#[derive(Debug, Clone)]
pub struct DefaultQualityAssessor {
    low_confidence_threshold: f64,
    missing_field_penalty: f64,
}

impl DefaultQualityAssessor {
    pub fn new(low_confidence_threshold: f64, missing_field_penalty: f64) -> Self {
        DefaultQualityAssessor {
            low_confidence_threshold,
            missing_field_penalty,
        }
    }
}

impl Default for DefaultQualityAssessor {
    fn default() -> Self {
        DefaultQualityAssessor::new(0.7, 0.1)
    }
}

impl QualityAssessor for DefaultQualityAssessor {
    fn generate_quality_report(
        &self,
        generated_fields: &HashMap<String, FieldGeneration>,
        confidence_scores: &HashMap<String, f64>,
        missing_fields: &[String],
        required_fields: &[&'static str],
    ) -> QualityReport {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (name, generation) in generated_fields {
            let confidence = confidence_scores
                .get(name)
                .copied()
                .unwrap_or(generation.confidence);
            let weight = if required_fields.iter().any(|f| *f == name.as_str()) {
                2.0
            } else {
                1.0
            };
            weighted_sum += confidence * weight;
            weight_total += weight;
        }

        let missing_required: Vec<String> = required_fields
            .iter()
            .filter(|f| missing_fields.iter().any(|m| m == *f))
            .map(|f| f.to_string())
            .collect();

        let base = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };
        let penalty = missing_required.len() as f64 * self.missing_field_penalty;
        let overall_quality = (base - penalty).clamp(0.0, 1.0);

        let mut low_confidence_fields: Vec<String> = generated_fields
            .iter()
            .filter(|(name, generation)| {
                confidence_scores
                    .get(*name)
                    .copied()
                    .unwrap_or(generation.confidence)
                    < self.low_confidence_threshold
            })
            .map(|(name, _)| name.clone())
            .collect();
        low_confidence_fields.sort();

        let mut recommendations = Vec::new();
        for field in &missing_required {
            recommendations.push(format!(
                "Required field '{field}' could not be generated; add it to the project metadata or documentation"
            ));
        }
        for field in &low_confidence_fields {
            recommendations.push(format!(
                "Field '{field}' was generated at low confidence; consider reviewing it manually"
            ));
        }

        debug!(
            overall_quality,
            missing_required = missing_required.len(),
            low_confidence = low_confidence_fields.len(),
            "Quality report computed"
        );

        QualityReport {
            overall_quality,
            required_fields_complete: missing_required.is_empty(),
            missing_required_fields: missing_required,
            low_confidence_fields,
            recommendations,
        }
    }
}
