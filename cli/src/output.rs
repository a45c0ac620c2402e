//! Result rendering

use nuclex_retrieval::{CorpusStats, SearchResult};
use serde::Serialize;

use crate::error::CliResult;

/// Characters of passage text shown per result in text mode
const PREVIEW_CHARS: usize = 400;

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    results: &'a [SearchResult],
}

pub fn render_results(query: &str, results: &[SearchResult], json: bool) -> CliResult<String> {
    if json {
        return Ok(serde_json::to_string_pretty(&SearchOutput { query, results })?);
    }
    if results.is_empty() {
        return Ok("No results found.".to_string());
    }

    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("[{}] {} ({:.3})\n", i + 1, heading(result), result.score));
        out.push_str(&format!("    {}\n", preview(&result.content)));
    }
    Ok(out.trim_end().to_string())
}

pub fn render_stats(stats: &CorpusStats, json: bool) -> CliResult<String> {
    if json {
        return Ok(serde_json::to_string_pretty(stats)?);
    }

    let mut out = format!(
        "phase: {:?}\nchunks: {}\nembedded: {}\nzero-filled: {}\nindexed: {}\n",
        stats.phase, stats.chunks, stats.embedded, stats.zero_filled, stats.indexed
    );
    if let Some(dimension) = stats.dimension {
        out.push_str(&format!("dimension: {}\n", dimension));
    }
    if let Some(kind) = stats.index_kind {
        out.push_str(&format!("index: {:?}\n", kind).to_lowercase());
    }
    for (part, count) in &stats.parts {
        out.push_str(&format!("part {}: {} chunks\n", part, count));
    }
    Ok(out.trim_end().to_string())
}

fn heading(result: &SearchResult) -> String {
    let meta = &result.metadata;
    let mut heading = format!("10 CFR Part {}", meta.part);
    if !meta.section.is_empty() {
        heading.push_str(&format!(" \u{a7} {}", meta.section));
    }
    let title = if meta.title.is_empty() {
        &meta.parent_title
    } else {
        &meta.title
    };
    if !title.is_empty() {
        heading.push_str(&format!(": {}", title));
    }
    heading
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuclex_retrieval::ChunkMetadata;

    fn result(section: &str, title: &str, content: &str, score: f32) -> SearchResult {
        SearchResult {
            content: content.to_string(),
            metadata: ChunkMetadata {
                part: "20".to_string(),
                section: section.to_string(),
                title: title.to_string(),
                parent_title: "Standards for Protection Against Radiation".to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_render_text() {
        let results = vec![result("20.1201", "Occupational dose limits", "The licensee shall\ncontrol...", 0.5)];
        let out = render_results("dose", &results, false).unwrap();
        assert_eq!(
            out,
            "[1] 10 CFR Part 20 \u{a7} 20.1201: Occupational dose limits (0.500)\n    The licensee shall control..."
        );
    }

    #[test]
    fn test_heading_falls_back_to_parent_title() {
        let out = heading(&result("", "", "x", 1.0));
        assert_eq!(out, "10 CFR Part 20: Standards for Protection Against Radiation");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_results("q", &[], false).unwrap(), "No results found.");
    }

    #[test]
    fn test_render_json() {
        let results = vec![result("20.1001", "Purpose", "text", 1.0)];
        let out = render_results("purpose", &results, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["query"], "purpose");
        assert_eq!(value["results"][0]["metadata"]["section"], "20.1001");
        assert_eq!(value["results"][0]["score"], 1.0);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "\u{a7}".repeat(PREVIEW_CHARS + 10);
        let out = preview(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), PREVIEW_CHARS + 3);
    }
}
