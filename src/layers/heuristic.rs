//! Heuristic layer: regex and document-structure heuristics over the README
//! and license files.
//!
//! Every extraction is best-effort and independently optional; an empty
//! result is a valid outcome for a sparse project.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::contract::{
    BoxError, FieldGeneration, GenerationLayer, GenerationSource, LayerResult,
};
use crate::project::ProjectData;

const METHOD: &str = "readme_heuristics";

static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bv?(\d+\.\d+(?:\.\d+)?)\b").unwrap());

static BADGE_OR_LINK_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:!?\[|<|\|)").unwrap());

/// (needle in license text, SPDX identifier)
const LICENSE_SIGNATURES: &[(&str, &str)] = &[
    ("mit license", "MIT"),
    ("apache license, version 2.0", "Apache-2.0"),
    ("apache license version 2.0", "Apache-2.0"),
    ("gnu general public license version 3", "GPL-3.0-only"),
    ("gnu general public license v3", "GPL-3.0-only"),
    ("gnu lesser general public license", "LGPL-3.0-only"),
    ("cern open hardware licence version 2 - strongly reciprocal", "CERN-OHL-S-2.0"),
    ("cern open hardware licence version 2 - weakly reciprocal", "CERN-OHL-W-2.0"),
    ("cern open hardware licence", "CERN-OHL-1.2"),
    ("creative commons attribution-sharealike", "CC-BY-SA-4.0"),
    ("creative commons attribution", "CC-BY-4.0"),
    ("tapr open hardware license", "TAPR-OHL-1.0"),
];

/// A handful of high-frequency English words; a README where they dominate is
/// tagged "en". The only language this detector knows.
const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "and", "of", "to", "for", "with", "this", "that", "you", "are",
];

/// Extracts title, description, version, license and documentation language
/// from the README and license files, at lower confidence than the direct
/// layer.
pub struct HeuristicLayer;

#[async_trait]
impl GenerationLayer for HeuristicLayer {
    fn source(&self) -> GenerationSource {
        GenerationSource::Heuristic
    }

    async fn process(&self, project: &ProjectData) -> Result<LayerResult, BoxError> {
        let mut result = LayerResult::new();

        if let Some(readme) = project.readme() {
            if let Some(title) = H1_RE.captures(readme).map(|c| c[1].trim().to_string()) {
                result.add_field(
                    "title",
                    FieldGeneration::text(title, 0.7, GenerationSource::Heuristic, METHOD)
                        .with_raw_source("README.md#h1"),
                );
            }
            if let Some(paragraph) = first_prose_paragraph(readme) {
                result.add_field(
                    "function",
                    FieldGeneration::text(paragraph, 0.5, GenerationSource::Heuristic, METHOD)
                        .with_raw_source("README.md#intro"),
                );
            }
            if let Some(version) = VERSION_RE.captures(readme).map(|c| c[1].to_string()) {
                result.add_field(
                    "version",
                    FieldGeneration::text(version, 0.6, GenerationSource::Heuristic, METHOD)
                        .with_raw_source("README.md#version"),
                );
            }
            if looks_english(readme) {
                result.add_field(
                    "documentation_language",
                    FieldGeneration::text("en", 0.6, GenerationSource::Heuristic, METHOD)
                        .with_raw_source("README.md#stopwords"),
                );
            }
        } else {
            result.log("no README found, heuristic extraction limited to license files");
        }

        if let Some((path, license)) = detect_license(project) {
            result.add_field(
                "license",
                FieldGeneration::text(license, 0.8, GenerationSource::Heuristic, METHOD)
                    .with_raw_source(path),
            );
        }

        result.log(format!(
            "heuristic layer extracted {} fields",
            result.fields.len()
        ));
        debug!(fields = result.fields.len(), "Heuristic layer finished");
        Ok(result)
    }
}

/// First paragraph of running text after the title: skips headings, badge
/// and link-only lines, and anything shorter than a sentence.
fn first_prose_paragraph(readme: &str) -> Option<String> {
    let mut paragraph: Vec<&str> = Vec::new();
    for line in readme.lines() {
        let trimmed = line.trim();
        let is_prose = !trimmed.is_empty()
            && !trimmed.starts_with('#')
            && !BADGE_OR_LINK_LINE_RE.is_match(trimmed);
        if is_prose {
            paragraph.push(trimmed);
        } else if !paragraph.is_empty() {
            break;
        }
    }
    let joined = paragraph.join(" ");
    if joined.len() >= 20 {
        Some(joined)
    } else {
        None
    }
}

fn looks_english(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .take(500)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .collect();
    if words.len() < 20 {
        return false;
    }
    let hits = words
        .iter()
        .filter(|w| ENGLISH_STOPWORDS.contains(&w.as_str()))
        .count();
    hits as f64 / words.len() as f64 >= 0.04
}

/// Match a LICENSE-named file's content against known license headers.
fn detect_license(project: &ProjectData) -> Option<(String, String)> {
    for (path, content) in project.texts() {
        let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
        if !(name.starts_with("license") || name.starts_with("licence") || name == "copying") {
            continue;
        }
        let haystack = content.to_lowercase();
        for (needle, spdx) in LICENSE_SIGNATURES {
            if haystack.contains(needle) {
                return Some((path.to_string(), spdx.to_string()));
            }
        }
    }
    None
}
