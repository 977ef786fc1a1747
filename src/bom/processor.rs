//! BOM Processor: parses each scored source into components, then
//! deduplicates across all sources.
//!
//! Format handling is resilient by construction: CSV rows that cannot be
//! resolved are skipped, JSON/YAML that fails to decode (or holds no
//! locatable components collection) falls back to markdown parsing of the
//! same text, and free text is scanned line by line with an ordered pattern
//! set where the first match wins. Nothing in this stage fails the run.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{BomSource, Component, ComponentMetadata};
use crate::config::BomConfig;

/// Column/key aliases per component role; first alias match wins.
const NAME_ALIASES: &[&str] = &["name", "item", "component", "part", "id", "title"];
const QUANTITY_ALIASES: &[&str] = &["quantity", "qty", "amount", "count", "number"];
const UNIT_ALIASES: &[&str] = &["unit", "units", "measure", "uom"];

const COLLECTION_KEYS: &[&str] = &["components", "parts", "items", "materials", "bom"];
const SUB_COMPONENT_KEYS: &[&str] = &["sub_components", "subcomponents", "children"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Csv,
    Json,
    Yaml,
    Markdown,
}

/// Parse every source and deduplicate the combined component list.
pub fn process_sources(sources: &[BomSource], config: &BomConfig) -> Vec<Component> {
    let mut components = Vec::new();
    for source in sources {
        let parsed = parse_source(source, config);
        debug!(
            path = %source.file_path,
            format = ?detect_format(source),
            count = parsed.len(),
            "[BOM][PROCESS] Parsed source"
        );
        components.extend(parsed);
    }
    deduplicate(components)
}

fn parse_source(source: &BomSource, config: &BomConfig) -> Vec<Component> {
    match detect_format(source) {
        SourceFormat::Csv => parse_csv(source, config),
        format @ (SourceFormat::Json | SourceFormat::Yaml) => {
            match parse_structured(source, config, format) {
                Ok(components) => components,
                Err(reason) => {
                    debug!(
                        path = %source.file_path,
                        reason = %reason,
                        "[BOM][PROCESS] Structured parse failed, falling back to markdown"
                    );
                    parse_markdown(source, config)
                }
            }
        }
        SourceFormat::Markdown => parse_markdown(source, config),
    }
}

fn detect_format(source: &BomSource) -> SourceFormat {
    let ext = source
        .file_path
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "csv" | "tsv" => return SourceFormat::Csv,
        "json" => return SourceFormat::Json,
        "yaml" | "yml" => return SourceFormat::Yaml,
        _ => {}
    }
    let trimmed = source.raw_content.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return SourceFormat::Json;
    }
    if looks_like_csv(&source.raw_content) {
        return SourceFormat::Csv;
    }
    SourceFormat::Markdown
}

fn looks_like_csv(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).take(3).collect();
    lines.len() >= 2
        && lines.iter().all(|line| {
            line.contains(',') && !line.trim_start().starts_with(['-', '*', '+', '#'])
        })
}

// --- CSV ---

fn parse_csv(source: &BomSource, config: &BomConfig) -> Vec<Component> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source.raw_content.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(path = %source.file_path, error = %e, "[BOM][PROCESS] Unreadable CSV header");
            return Vec::new();
        }
    };

    let Some(name_idx) = find_column(&headers, NAME_ALIASES) else {
        debug!(path = %source.file_path, "[BOM][PROCESS] CSV has no resolvable name column");
        return Vec::new();
    };
    let quantity_idx = find_column(&headers, QUANTITY_ALIASES);
    let unit_idx = find_column(&headers, UNIT_ALIASES);

    let mut components = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(path = %source.file_path, error = %e, "[BOM][PROCESS] Skipping bad CSV row");
                continue;
            }
        };
        let name = record.get(name_idx).unwrap_or("").trim();
        if name.len() < config.min_component_name_len {
            continue;
        }
        let quantity = quantity_idx
            .and_then(|i| record.get(i))
            .and_then(parse_number)
            .unwrap_or(1.0);
        let unit = unit_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("pcs");
        components.push(Component::new(
            name,
            quantity,
            unit,
            ComponentMetadata::from_source(source),
        ));
    }
    components
}

/// Fuzzy header match: first alias with any matching column wins the role.
fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    for alias in aliases {
        for (idx, header) in headers.iter().enumerate() {
            let header = header.trim().to_lowercase();
            if header == *alias || header.contains(alias) {
                return Some(idx);
            }
        }
    }
    None
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches(['x', 'X', '×']).trim();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

// --- JSON / YAML ---

fn parse_structured(
    source: &BomSource,
    config: &BomConfig,
    format: SourceFormat,
) -> Result<Vec<Component>, String> {
    let value: serde_json::Value = match format {
        SourceFormat::Json => {
            serde_json::from_str(&source.raw_content).map_err(|e| e.to_string())?
        }
        SourceFormat::Yaml => {
            serde_yaml::from_str(&source.raw_content).map_err(|e| e.to_string())?
        }
        _ => unreachable!("structured parse called for non-structured format"),
    };

    let items = locate_components(&value)
        .ok_or_else(|| "no components collection in document".to_string())?;

    Ok(items
        .iter()
        .filter_map(|item| component_from_value(item, source, config))
        .collect())
}

/// Find the collection of component objects inside an arbitrary document.
fn locate_components(value: &serde_json::Value) -> Option<Vec<serde_json::Value>> {
    if let Some(array) = value.as_array() {
        return Some(array.clone());
    }
    let object = value.as_object()?;
    for key in COLLECTION_KEYS {
        let Some(candidate) = object.get(*key) else {
            continue;
        };
        if let Some(array) = candidate.as_array() {
            return Some(array.clone());
        }
        if let Some(inner) = candidate.as_object() {
            for inner_key in COLLECTION_KEYS {
                if let Some(array) = inner.get(*inner_key).and_then(|v| v.as_array()) {
                    return Some(array.clone());
                }
            }
        }
    }
    // A map whose values are all objects is itself the component list.
    if !object.is_empty() && object.values().all(|v| v.is_object()) {
        return Some(object.values().cloned().collect());
    }
    None
}

fn component_from_value(
    item: &serde_json::Value,
    source: &BomSource,
    config: &BomConfig,
) -> Option<Component> {
    let object = item.as_object()?;

    let mut name = None;
    let mut name_key = "";
    for alias in NAME_ALIASES {
        match object.get(*alias) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                name = Some(s.trim().to_string());
                name_key = alias;
                break;
            }
            Some(serde_json::Value::Number(n)) => {
                name = Some(n.to_string());
                name_key = alias;
                break;
            }
            _ => {}
        }
    }
    let name = name?;
    if name.len() < config.min_component_name_len {
        return None;
    }

    let mut quantity = 1.0;
    let mut quantity_key = "";
    for alias in QUANTITY_ALIASES {
        if let Some(parsed) = object.get(*alias).and_then(numeric_value) {
            quantity = parsed;
            quantity_key = alias;
            break;
        }
    }

    let mut unit = "pcs".to_string();
    let mut unit_key = "";
    for alias in UNIT_ALIASES {
        if let Some(s) = object.get(*alias).and_then(|v| v.as_str()) {
            if !s.trim().is_empty() {
                unit = s.trim().to_string();
                unit_key = alias;
                break;
            }
        }
    }

    let mut metadata = ComponentMetadata::from_source(source);
    let mut sub_components = Vec::new();
    for (key, value) in object {
        if key == name_key || key == quantity_key || key == unit_key {
            continue;
        }
        if SUB_COMPONENT_KEYS.contains(&key.as_str()) {
            if let Some(children) = value.as_array() {
                sub_components = children
                    .iter()
                    .filter_map(|child| component_from_value(child, source, config))
                    .collect();
                continue;
            }
        }
        metadata.extra.insert(key.clone(), value.clone());
    }

    let mut component = Component::new(name, quantity, unit, metadata);
    component.sub_components = sub_components;
    Some(component)
}

fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        serde_json::Value::String(s) => parse_number(s),
        _ => None,
    }
}

// --- Markdown / free text ---

/// Ordered bullet/numbered-line patterns; the first match wins. Named groups:
/// `qty` (optional multiplier) and `name`.
static MD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // "* 2x Ear tube (eartube.stl)"
        Regex::new(r"^\s*[-*+•]\s*(?P<qty>\d+(?:\.\d+)?)\s*[xX×]\s+(?P<name>.+)$").unwrap(),
        // "- 2 Ear tubes"
        Regex::new(r"^\s*[-*+•]\s*(?P<qty>\d+(?:\.\d+)?)\s+(?P<name>.+)$").unwrap(),
        // "1. 2x Ear tube" / "2) Frame plate"
        Regex::new(r"^\s*\d+[.)]\s+(?:(?P<qty>\d+(?:\.\d+)?)\s*[xX×]\s+)?(?P<name>.+)$").unwrap(),
        // "- Ear tube"
        Regex::new(r"^\s*[-*+•]\s+(?P<name>.+)$").unwrap(),
    ]
});

static FILE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()\s]+\.[A-Za-z0-9]{1,5})\)").unwrap());

static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());

fn parse_markdown(source: &BomSource, config: &BomConfig) -> Vec<Component> {
    let mut components = Vec::new();
    for line in source.raw_content.lines() {
        // Task-list checkboxes are instructions, not parts.
        if line.trim_start().starts_with("- [") {
            continue;
        }
        let Some((quantity, raw_name)) = match_line(line) else {
            continue;
        };

        let file_reference = FILE_REF_RE
            .captures(&raw_name)
            .map(|caps| caps[1].to_string());
        let without_ref = FILE_REF_RE.replace(&raw_name, "").to_string();

        let name = sanitize_name(&without_ref);
        if name.len() < config.min_component_name_len {
            continue;
        }

        let mut metadata = ComponentMetadata::from_source(source);
        metadata.file_reference = file_reference;
        components.push(Component::new(name, quantity, "pcs", metadata));
    }
    components
}

fn match_line(line: &str) -> Option<(f64, String)> {
    for pattern in MD_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            let quantity = caps
                .name("qty")
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(1.0);
            return Some((quantity, caps["name"].to_string()));
        }
    }
    None
}

/// Strip markdown decoration and dangling punctuation from a captured name.
fn sanitize_name(raw: &str) -> String {
    let linkless = MD_LINK_RE.replace_all(raw, "$1");
    let stripped: String = linkless
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '~'))
        .collect();
    stripped
        .trim()
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '.' | '-'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// --- Deduplication ---

/// Collapse components sharing a case-insensitive trimmed name, keeping the
/// one with strictly greatest confidence (first seen wins ties). First-seen
/// ordering of the surviving names is preserved.
fn deduplicate(components: Vec<Component>) -> Vec<Component> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, Component> = HashMap::new();

    for component in components {
        let key = component.dedup_key();
        match best.get(&key) {
            Some(existing) if component.metadata.confidence > existing.metadata.confidence => {
                debug!(
                    name = %component.name,
                    old_confidence = existing.metadata.confidence,
                    new_confidence = component.metadata.confidence,
                    "[BOM][PROCESS] Duplicate replaced by higher-confidence source"
                );
                best.insert(key, component);
            }
            Some(_) => {
                debug!(name = %component.name, "[BOM][PROCESS] Duplicate dropped");
            }
            None => {
                order.push(key.clone());
                best.insert(key, component);
            }
        }
    }

    order.into_iter().filter_map(|key| best.remove(&key)).collect()
}
