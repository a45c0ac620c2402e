//! Chunk and search result types
//!
//! A chunk is the smallest retrievable unit of corpus text. Chunks are held
//! in a fixed-order sequence and referenced by position.

use serde::{Deserialize, Serialize};

/// Provenance of a chunk within the corpus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Corpus part identifier, taken from the file name (e.g. "50")
    pub part: String,
    /// Section identifier within the part, empty for untitled leaves
    pub section: String,
    /// The node's own heading, empty if it has none
    pub title: String,
    /// Heading inherited from the nearest titled ancestor
    pub parent_title: String,
}

/// A retrievable piece of corpus text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Set when `embedding` is a zero vector standing in for a malformed response
    #[serde(skip)]
    pub fallback: bool,
}

impl Chunk {
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
            embedding: None,
            fallback: false,
        }
    }

    /// Attach a computed embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self.fallback = false;
        self
    }

    /// Substitute a zero vector of `dimension` components
    pub fn set_zero_fallback(&mut self, dimension: usize) {
        self.embedding = Some(vec![0.0; dimension]);
        self.fallback = true;
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Relevance in (0, 1], higher is more relevant
    pub score: f32,
}

impl SearchResult {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_fallback_marks_chunk() {
        let mut chunk = Chunk::new("text", ChunkMetadata::default());
        assert!(!chunk.has_embedding());

        chunk.set_zero_fallback(4);
        assert_eq!(chunk.embedding.as_deref(), Some(&[0.0_f32; 4][..]));
        assert!(chunk.fallback);

        let chunk = chunk.with_embedding(vec![1.0, 2.0]);
        assert!(!chunk.fallback);
    }

    #[test]
    fn test_search_result_json_shape() {
        let metadata = ChunkMetadata {
            part: "50".to_string(),
            section: "50.2".to_string(),
            title: "Definitions".to_string(),
            parent_title: "Domestic Licensing".to_string(),
        };
        let chunk = Chunk::new("Byproduct material means...", metadata).with_embedding(vec![0.5]);
        let result = SearchResult::from_chunk(&chunk, 0.5);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["metadata"]["part"], "50");
        assert_eq!(json["metadata"]["parent_title"], "Domestic Licensing");
        assert_eq!(json["score"], 0.5);
        assert!(json.get("embedding").is_none());
    }
}
