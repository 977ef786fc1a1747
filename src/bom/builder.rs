//! BOM Builder: validates components and assembles the final
//! [`BillOfMaterials`](super::BillOfMaterials).
//!
//! Deterministic given its input (aside from the timestamp and generated
//! ids). Never fails: a component violating the business rules is silently
//! excluded, visible afterwards as the gap between `source_count` and
//! `final_count`.

use tracing::{debug, info};

use super::{BillOfMaterials, BomMetadata, Component};

pub const GENERATION_METHOD: &str = "bom_normalization";

/// Validate the component list and assemble the BOM.
pub fn build(components: Vec<Component>, project_name: &str) -> BillOfMaterials {
    let source_count = components.len();

    let validated: Vec<Component> = components
        .into_iter()
        .filter_map(|mut component| {
            if component.name.trim().len() < 2 {
                debug!(name = %component.name, "[BOM][BUILD] Dropping component with degenerate name");
                return None;
            }
            if component.quantity <= 0.0 {
                debug!(
                    name = %component.name,
                    quantity = component.quantity,
                    "[BOM][BUILD] Dropping component with non-positive quantity"
                );
                return None;
            }
            if component.unit.trim().is_empty() {
                component.unit = "pcs".to_string();
            }
            Some(component)
        })
        .collect();

    let final_count = validated.len();
    let overall_confidence = if validated.is_empty() {
        None
    } else {
        Some(
            validated
                .iter()
                .map(|c| c.metadata.confidence)
                .sum::<f64>()
                / validated.len() as f64,
        )
    };

    if final_count < source_count {
        info!(
            dropped = source_count - final_count,
            "[BOM][BUILD] Excluded invalid components"
        );
    }

    BillOfMaterials {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("{} Bill of Materials", project_name),
        components: validated,
        metadata: BomMetadata {
            generated_at: chrono::Utc::now().to_rfc3339(),
            source_count,
            final_count,
            generation_method: GENERATION_METHOD.to_string(),
            overall_confidence,
        },
    }
}
