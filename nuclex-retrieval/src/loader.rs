//! Corpus document loader
//!
//! Reads structured regulation files (`<prefix>_part<NN>_structured.json`)
//! and flattens each section tree into [`Chunk`]s with provenance metadata.
//!
//! A file holds `{ "title": ..., "sections": { id: node, ... } }` where a
//! node is either a bare string or an object with an optional `title`,
//! optional `content`, and a list of `subsections`.

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{Chunk, ChunkMetadata};
use crate::error::{Result, RetrievalError};

/// One corpus file
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDocument {
    #[serde(default)]
    pub title: String,
    pub sections: IndexMap<String, SectionNode>,
}

/// A node in the section tree
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SectionNode {
    /// Literal content with no children
    Text(String),
    Structured(StructuredSection),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredSection {
    /// Explicit identifier; subsections without one inherit the enclosing key
    #[serde(default, alias = "section")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub subsections: Vec<SectionNode>,
}

/// Outcome of loading a directory
#[derive(Debug, Default)]
pub struct LoadReport {
    pub chunks: Vec<Chunk>,
    pub files_loaded: usize,
    pub files_skipped: Vec<PathBuf>,
}

/// Load every corpus file in `dir` whose name ends with `suffix`.
///
/// Files are visited in name order. A file that cannot be read or parsed is
/// skipped with a warning; only an unreadable directory is an error.
pub fn load_directory(dir: &Path, suffix: &str) -> Result<LoadReport> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(suffix))
        })
        .collect();
    paths.sort();

    log::info!(
        "Loading {} corpus files from {}",
        paths.len(),
        dir.display()
    );

    let mut report = LoadReport::default();
    for path in paths {
        match load_file(&path) {
            Ok(chunks) => {
                log::debug!("{}: {} chunks", path.display(), chunks.len());
                report.chunks.extend(chunks);
                report.files_loaded += 1;
            }
            Err(e) => {
                log::warn!("Skipping corpus file: {}", e);
                report.files_skipped.push(path);
            }
        }
    }

    log::info!(
        "Loaded {} chunks from {} files ({} skipped)",
        report.chunks.len(),
        report.files_loaded,
        report.files_skipped.len()
    );
    Ok(report)
}

/// Load and chunk a single corpus file
pub fn load_file(path: &Path) -> Result<Vec<Chunk>> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RetrievalError::corpus_load(&display, e.to_string()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    parse_document(&raw, &part_from_filename(file_name))
        .map_err(|e| RetrievalError::corpus_load(&display, e.to_string()))
}

/// Parse a corpus file body and flatten it into chunks
pub fn parse_document(json: &str, part: &str) -> Result<Vec<Chunk>> {
    let document: CorpusDocument = serde_json::from_str(json)?;
    Ok(chunk_document(&document, part))
}

/// Extract the part identifier from a file name.
///
/// `10cfr_part50_structured.json` yields `50`. Names without a second
/// `_`-separated token fall back to the file stem.
pub fn part_from_filename(file_name: &str) -> String {
    match file_name.split('_').nth(1) {
        Some(token) => token.strip_prefix("part").unwrap_or(token).to_string(),
        None => Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string(),
    }
}

/// Flatten a document's section tree, depth-first pre-order
pub fn chunk_document(document: &CorpusDocument, part: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for (key, node) in &document.sections {
        walk(node, key, true, &document.title, part, &mut chunks);
    }
    chunks
}

fn walk(
    node: &SectionNode,
    key: &str,
    top_level: bool,
    parent_title: &str,
    part: &str,
    out: &mut Vec<Chunk>,
) {
    match node {
        SectionNode::Text(text) => {
            if text.trim().is_empty() {
                return;
            }
            let section = if top_level { key } else { "" };
            out.push(Chunk::new(
                text.as_str(),
                metadata(part, section, "", parent_title),
            ));
        }
        SectionNode::Structured(section) => {
            let own_title = section.title.as_deref().unwrap_or_default();
            let current_title = if own_title.trim().is_empty() {
                parent_title
            } else {
                own_title
            };
            let section_id = section.id.as_deref().unwrap_or(key);

            if let Some(content) = section.content.as_deref() {
                if !content.trim().is_empty() {
                    out.push(Chunk::new(
                        content,
                        metadata(part, section_id, own_title, parent_title),
                    ));
                }
            }

            for child in &section.subsections {
                walk(child, section_id, false, current_title, part, out);
            }
        }
    }
}

fn metadata(part: &str, section: &str, title: &str, parent_title: &str) -> ChunkMetadata {
    ChunkMetadata {
        part: part.to_string(),
        section: section.to_string(),
        title: title.to_string(),
        parent_title: parent_title.to_string(),
    }
}
