//! BOM Collector: discovers candidate BOM-bearing regions and scores them.
//!
//! Three passes, in decreasing order of trust:
//!   1. Dedicated BOM-named files (bom.csv, materials.yaml, ...) at a high
//!      baseline confidence with format/content boosts.
//!   2. Content-aware section detection over every eligible text file, scoring
//!      sections by a weighted keyword/structure heuristic.
//!   3. A stricter regex-only scan of README/materials headings, used only
//!      when the first two passes found nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{BomSource, BomSourceError, SourceType};
use crate::config::BomConfig;
use crate::project::{DocumentationEntry, ProjectData};

/// Phrases indicating a section talks about parts and materials.
const BOM_KEYWORDS: &[&str] = &[
    "bill of materials",
    "bom",
    "parts list",
    "part list",
    "components",
    "materials",
    "you will need",
    "shopping list",
    "required parts",
    "hardware required",
];

/// Phrases indicating legal boilerplate rather than a parts list.
const LEGAL_KEYWORDS: &[&str] = &[
    "license",
    "licence",
    "copyright",
    "warranty",
    "liability",
    "terms and conditions",
    "changelog",
];

const MATERIAL_TERMS: &[&str] = &[
    "pla",
    "abs",
    "petg",
    "brass",
    "steel",
    "aluminum",
    "aluminium",
    "copper",
    "wood",
    "plywood",
    "acrylic",
    "nylon",
    "silicone",
    "rubber",
];

static DIMENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b\d+(?:\.\d+)?\s?(?:mm|cm|m|in|inch|g|kg|ml|l)\b"#).unwrap());

static QUANTITY_LINE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\b\d+\s*[x×]\s+\S").unwrap(),
        Regex::new(r"^\s*[-*+•]\s*\d+").unwrap(),
        Regex::new(r"(?i)\b\d+\s+(?:pcs|pieces|units?)\b").unwrap(),
    ]
});

static BULLET_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+\S").unwrap());

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s*(.*)$").unwrap());

static BOM_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:bom|bill[_\- ]?of[_\- ]?materials|materials|parts(?:[_\- ]?list)?)\.(?:csv|tsv|json|ya?ml|md|txt)$")
        .unwrap()
});

static FALLBACK_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^#{1,6}\s*(?:bill of materials|materials|parts list|bom)\b.*$").unwrap()
});

static NEXT_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s").unwrap());

/// Extensions that never contain a parseable parts list.
const NON_TEXT_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "stl", "step", "stp", "obj", "pdf",
    "zip", "gz", "f3d", "dxf",
];

static EXCLUDED_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:license|licence|copying|changelog|contributing|code_of_conduct|notice)")
        .unwrap()
});

/// Discover and score candidate BOM sources across the whole snapshot.
pub fn collect(project: &ProjectData, config: &BomConfig) -> Vec<BomSource> {
    let mut sources: Vec<BomSource> = Vec::new();

    for (path, content) in project.texts() {
        let filename = path.rsplit('/').next().unwrap_or(path);
        if !is_eligible(filename) {
            debug!(path, "[BOM][COLLECT] Skipping ineligible file");
            continue;
        }
        if BOM_FILENAME_RE.is_match(filename) {
            match dedicated_file_source(path, content, config) {
                Ok(source) => {
                    debug!(path, confidence = source.confidence, "[BOM][COLLECT] Dedicated BOM file");
                    sources.push(source);
                }
                Err(e) => warn!(path, error = %e, "[BOM][COLLECT] Rejected dedicated BOM file"),
            }
            continue;
        }
        sources.extend(scan_sections(path, content, is_readme(filename), config));
    }

    for doc in &project.documentation {
        sources.extend(scan_documentation(doc, config));
    }

    if sources.is_empty() {
        debug!("[BOM][COLLECT] Section detection found nothing, running fallback heading scan");
        sources = fallback_scan(project, config);
    }

    sources
}

fn is_eligible(filename: &str) -> bool {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    if NON_TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }
    !EXCLUDED_FILENAME_RE.is_match(filename)
}

fn is_readme(filename: &str) -> bool {
    filename.to_lowercase().starts_with("readme")
}

/// A dedicated BOM-named file is always collected; its confidence starts at
/// the configured baseline and is boosted for well-structured formats and
/// content-quality signals, capped at `bom_file_cap`.
fn dedicated_file_source(
    path: &str,
    content: &str,
    config: &BomConfig,
) -> Result<BomSource, BomSourceError> {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    let mut confidence = config.bom_file_baseline;

    let data_lines = content.lines().filter(|l| !l.trim().is_empty()).count();
    match ext.as_str() {
        "csv" | "tsv" if content.contains(',') && data_lines >= 2 => confidence += 0.1,
        "json" | "yaml" | "yml" => confidence += 0.1,
        _ => {}
    }
    if quantity_hits(content) >= 3 {
        confidence += 0.05;
    }
    confidence = confidence.min(config.bom_file_cap);

    BomSource::new(SourceType::BomFile, content, path, confidence)
        .map(|s| s.with_metadata("format", ext))
}

fn quantity_hits(text: &str) -> usize {
    text.lines()
        .filter(|line| QUANTITY_LINE_RES.iter().any(|re| re.is_match(line)))
        .count()
}

struct Section {
    heading: String,
    body: String,
    score: f64,
    indicator_density: f64,
}

/// Split a document into heading-delimited sections and score each.
fn split_sections(content: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current_heading = String::new();
    let mut current_body: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(caps) = HEADING_RE.captures(line) {
            if !current_body.is_empty() || !current_heading.is_empty() {
                sections.push((current_heading.clone(), current_body.clone()));
            }
            current_heading = caps[2].trim().to_string();
            current_body = Vec::new();
        } else {
            current_body.push(line);
        }
    }
    if !current_body.is_empty() || !current_heading.is_empty() {
        sections.push((current_heading, current_body));
    }

    sections
        .into_iter()
        .map(|(heading, body)| (heading, body.join("\n")))
        .collect()
}

/// Weighted BOM-likelihood score for one section, in [0, 1].
///
/// Signals: BOM-keyword hits (capped), legal-keyword penalty, quantity
/// patterns, bullet/numbered-list structure, material and dimensional-unit
/// mentions.
fn score_section(heading: &str, body: &str) -> (f64, f64) {
    let text = format!("{}\n{}", heading, body).to_lowercase();
    let mut score = 0.0;

    let keyword_hits: usize = BOM_KEYWORDS.iter().map(|k| text.matches(k).count()).sum();
    score += (keyword_hits as f64 * 0.15).min(0.45);

    // A heading that names the list outright is worth more than body mentions.
    let heading_lower = heading.to_lowercase();
    if BOM_KEYWORDS.iter().any(|k| heading_lower.contains(k)) {
        score += 0.2;
    }

    let legal_hits: usize = LEGAL_KEYWORDS.iter().map(|k| text.matches(k).count()).sum();
    score -= (legal_hits as f64 * 0.2).min(0.4);

    let qty_hits = quantity_hits(body);
    score += (qty_hits as f64 * 0.05).min(0.25);

    let total_lines = body.lines().filter(|l| !l.trim().is_empty()).count().max(1);
    let bullet_lines = body
        .lines()
        .filter(|line| BULLET_LINE_RE.is_match(line))
        .count();
    let bullet_ratio = bullet_lines as f64 / total_lines as f64;
    if bullet_ratio >= 0.3 {
        score += 0.2;
    } else if bullet_lines > 0 {
        score += 0.1;
    }

    let material_hits: usize = MATERIAL_TERMS
        .iter()
        .map(|term| text.matches(term).count())
        .sum();
    let dimension_hits = DIMENSION_RE.find_iter(body).count();
    score += ((material_hits + dimension_hits) as f64 * 0.05).min(0.2);

    let density = (keyword_hits + qty_hits + bullet_lines) as f64 / total_lines as f64;
    (score.clamp(0.0, 1.0), density)
}

fn classify_section(heading: &str, readme: bool) -> SourceType {
    let heading = heading.to_lowercase();
    if heading.contains("bill of materials") || heading.split_whitespace().any(|w| w == "bom") {
        SourceType::ReadmeBom
    } else if heading.contains("assembly") {
        SourceType::AssemblyGuide
    } else if heading.contains("material") || readme {
        SourceType::ReadmeMaterials
    } else {
        SourceType::Documentation
    }
}

fn scan_sections(path: &str, content: &str, readme: bool, config: &BomConfig) -> Vec<BomSource> {
    let mut kept: Vec<Section> = Vec::new();
    for (heading, body) in split_sections(content) {
        let (score, indicator_density) = score_section(&heading, &body);
        if score > config.section_detection_threshold {
            debug!(path, heading = %heading, score, "[BOM][COLLECT] Section kept");
            kept.push(Section {
                heading,
                body,
                score,
                indicator_density,
            });
        }
    }

    let merged = merge_adjacent(kept);

    merged
        .into_iter()
        .filter_map(|section| {
            let source_type = classify_section(&section.heading, readme);
            match BomSource::new(source_type, section.body, path, section.score) {
                Ok(source) => Some(source.with_metadata("heading", section.heading)),
                Err(e) => {
                    warn!(path, error = %e, "[BOM][COLLECT] Rejected section source");
                    None
                }
            }
        })
        .collect()
}

/// Merge adjacent kept sections whose confidence is close or whose
/// BOM-indicator density is similar; a split parts list parses better whole.
fn merge_adjacent(sections: Vec<Section>) -> Vec<Section> {
    let mut merged: Vec<Section> = Vec::new();
    for section in sections {
        match merged.last_mut() {
            Some(last)
                if (last.score - section.score).abs() < 0.15
                    || (last.indicator_density - section.indicator_density).abs() < 0.2 =>
            {
                last.body.push_str("\n\n");
                last.body.push_str(&section.body);
                last.score = last.score.max(section.score);
                last.indicator_density = last.indicator_density.max(section.indicator_density);
            }
            _ => merged.push(section),
        }
    }
    merged
}

fn scan_documentation(doc: &DocumentationEntry, config: &BomConfig) -> Vec<BomSource> {
    let filename = doc.path.rsplit('/').next().unwrap_or(&doc.path);
    if !is_eligible(filename) {
        return Vec::new();
    }
    let mut sources = scan_sections(&doc.path, &doc.content, false, config);
    for source in &mut sources {
        // Section typing inside documentation stays Documentation unless the
        // heading was explicitly BOM- or assembly-flavoured.
        if source.source_type == SourceType::ReadmeMaterials {
            source.source_type = SourceType::Documentation;
        }
        source
            .metadata
            .insert("document_title".to_string(), doc.title.clone());
    }
    sources
}

/// Last-resort scan: regex-matched README/materials headings only, at lower
/// confidence ceilings than the content-aware pass.
fn fallback_scan(project: &ProjectData, config: &BomConfig) -> Vec<BomSource> {
    let mut sources = Vec::new();

    if let Some(readme) = project.readme() {
        if let Some(block) = fallback_block(readme) {
            match BomSource::new(
                SourceType::ReadmeMaterials,
                block,
                "README.md",
                config.readme_fallback_cap,
            ) {
                Ok(source) => sources.push(source.with_metadata("fallback", "readme")),
                Err(e) => warn!(error = %e, "[BOM][COLLECT] Fallback README source rejected"),
            }
        }
    }

    for doc in &project.documentation {
        if let Some(block) = fallback_block(&doc.content) {
            match BomSource::new(
                SourceType::Documentation,
                block,
                doc.path.clone(),
                config.doc_fallback_cap,
            ) {
                Ok(source) => sources.push(source.with_metadata("fallback", "documentation")),
                Err(e) => {
                    warn!(path = %doc.path, error = %e, "[BOM][COLLECT] Fallback doc source rejected")
                }
            }
        }
    }

    sources
}

/// The block from a matched materials heading up to the next heading.
fn fallback_block(content: &str) -> Option<String> {
    let m = FALLBACK_HEADING_RE.find(content)?;
    let rest = &content[m.end()..];
    let end = NEXT_HEADING_RE
        .find(rest)
        .map(|h| h.start())
        .unwrap_or(rest.len());
    let block = rest[..end].trim();
    if block.is_empty() {
        None
    } else {
        Some(block.to_string())
    }
}
