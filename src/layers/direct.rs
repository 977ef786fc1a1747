//! Direct layer: maps platform metadata keys straight onto manifest fields.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::contract::{
    BoxError, FieldGeneration, GenerationLayer, GenerationSource, LayerResult,
};
use crate::project::ProjectData;

const METHOD: &str = "platform_metadata";
const CONFIDENCE: f64 = 0.9;

/// Reads fields the hosting platform already knows: name, description,
/// license, owner, language. Produces nothing for absent keys; never fails.
pub struct DirectLayer;

#[async_trait]
impl GenerationLayer for DirectLayer {
    fn source(&self) -> GenerationSource {
        GenerationSource::Direct
    }

    async fn process(&self, project: &ProjectData) -> Result<LayerResult, BoxError> {
        let mut result = LayerResult::new();

        if let Some((key, title)) = first_string(project, &["name", "title", "project_name"]) {
            add(&mut result, "title", title, key);
        }
        if let Some((key, version)) = first_string(project, &["version", "tag", "release"]) {
            add(&mut result, "version", version, key);
        }
        if let Some((key, license)) = license_from_metadata(project) {
            add(&mut result, "license", license, key);
        }
        if let Some((key, licensor)) = licensor_from_metadata(project) {
            add(&mut result, "licensor", licensor, key);
        }
        if let Some((key, language)) = first_string(
            project,
            &["documentation_language", "natural_language", "language"],
        ) {
            add(&mut result, "documentation_language", language, key);
        }
        if let Some((key, function)) = first_string(project, &["description", "summary"]) {
            add(&mut result, "function", function, key);
        }

        result.log(format!(
            "direct layer mapped {} metadata fields",
            result.fields.len()
        ));
        debug!(fields = result.fields.len(), "Direct layer finished");
        Ok(result)
    }
}

fn add(result: &mut LayerResult, field: &str, value: String, metadata_key: &str) {
    result.add_field(
        field,
        FieldGeneration::text(value, CONFIDENCE, GenerationSource::Direct, METHOD)
            .with_raw_source(format!("metadata.{metadata_key}")),
    );
}

/// First metadata key holding a non-empty string (numbers are stringified).
fn first_string<'a>(project: &ProjectData, keys: &[&'a str]) -> Option<(&'a str, String)> {
    for key in keys {
        match project.metadata.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some((key, s.trim().to_string()))
            }
            Some(Value::Number(n)) => return Some((key, n.to_string())),
            _ => {}
        }
    }
    None
}

/// License metadata is either a plain string or a platform object such as
/// `{"key": "mit", "name": "MIT License", "spdx_id": "MIT"}`.
fn license_from_metadata(project: &ProjectData) -> Option<(&'static str, String)> {
    let value = project.metadata.get("license")?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(("license", s.trim().to_string())),
        Value::Object(obj) => ["spdx_id", "spdx", "id", "key", "name"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .map(|s| ("license", s.trim().to_string())),
        _ => None,
    }
}

/// Licensor metadata is a string, or an owner/author object with a
/// display name or account login.
fn licensor_from_metadata(project: &ProjectData) -> Option<(&'static str, String)> {
    for key in ["licensor", "author", "owner", "organization"] {
        let Some(value) = project.metadata.get(key) else {
            continue;
        };
        let resolved = match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(obj) => ["name", "login"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string()),
            _ => None,
        };
        if let Some(licensor) = resolved {
            return Some((key, licensor));
        }
    }
    None
}
