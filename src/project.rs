//! Input data model: a read-only snapshot of a hardware project repository.
//!
//! A [`ProjectData`] is produced by an external platform extractor (GitHub,
//! GitLab, local clone, ...) before the generation engine runs. The engine and
//! the BOM pipeline only ever read from it; nothing in this crate mutates a
//! snapshot after construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of a repository describing a hardware project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectData {
    /// Identifier of the hosting platform the snapshot came from (e.g. "github").
    pub platform: String,
    /// Canonical URL of the project.
    pub url: String,
    /// Platform metadata (name, description, license, owner, ...), as delivered.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Files discovered in the repository tree.
    #[serde(default)]
    pub files: Vec<ProjectFile>,
    /// Documentation entries (wiki pages, docs/ content) with extracted text.
    #[serde(default)]
    pub documentation: Vec<DocumentationEntry>,
    /// Raw text content keyed by repository path, for files fetched separately.
    #[serde(default)]
    pub raw_content: HashMap<String, String>,
}

/// One file in the repository tree. `content` is present only for text files
/// the producer chose to inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

/// A documentation page with its extracted text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationEntry {
    pub title: String,
    pub path: String,
    pub content: String,
}

impl ProjectData {
    /// True when the snapshot carries no usable evidence at all. Such input is
    /// rejected by the engine before any layer runs.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
            && self.files.is_empty()
            && self.documentation.is_empty()
            && self.raw_content.is_empty()
    }

    /// All texts available for scanning: inlined file contents first, then
    /// raw-content entries for paths not already covered by a file.
    pub fn texts(&self) -> Vec<(&str, &str)> {
        let mut seen: Vec<(&str, &str)> = self
            .files
            .iter()
            .filter_map(|f| f.content.as_deref().map(|c| (f.path.as_str(), c)))
            .collect();
        for (path, content) in &self.raw_content {
            if !seen.iter().any(|(p, _)| p == path) {
                seen.push((path.as_str(), content.as_str()));
            }
        }
        seen
    }

    /// The README text, if the snapshot contains one.
    pub fn readme(&self) -> Option<&str> {
        self.texts()
            .into_iter()
            .find(|(path, _)| {
                let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
                name == "readme.md" || name == "readme" || name == "readme.txt"
            })
            .map(|(_, content)| content)
    }

    /// A display name for the project: platform metadata name if present,
    /// otherwise the last URL segment.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.metadata.get("name").and_then(|v| v.as_str()) {
            return name.to_string();
        }
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("project")
            .to_string()
    }
}
