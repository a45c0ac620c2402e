//! Corpus snapshot
//!
//! A corpus is the ordered chunk sequence plus the index built over it.
//! Snapshots are immutable; a rebuild produces a new one and swaps it in.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::config::{IndexKind, IndexOptions};
use crate::error::{Result, RetrievalError};
use crate::index::VectorIndex;

/// Index lifecycle
///
/// `Unbuilt -> Building -> Ready | Empty`, and `Ready | Empty -> Building`
/// on rebuild or reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPhase {
    /// No build attempted yet
    Unbuilt,
    /// A build is in progress; the previous snapshot is still served
    Building,
    /// Index holds at least one vector
    Ready,
    /// Build finished but no chunk had a usable embedding
    Empty,
}

/// Chunks plus their index
#[derive(Clone)]
pub struct Corpus {
    chunks: Arc<Vec<Chunk>>,
    index: Option<Arc<VectorIndex>>,
    phase: IndexPhase,
}

impl Corpus {
    /// Chunks with no index yet
    pub fn unbuilt(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks: Arc::new(chunks),
            index: None,
            phase: IndexPhase::Unbuilt,
        }
    }

    /// Build the index over `chunks`
    pub fn built(chunks: Vec<Chunk>, options: &IndexOptions) -> Self {
        let index = VectorIndex::build(&chunks, options).map(Arc::new);
        let phase = if index.is_some() {
            IndexPhase::Ready
        } else {
            log::warn!("No valid embeddings found; index not created");
            IndexPhase::Empty
        };
        Self {
            chunks: Arc::new(chunks),
            index,
            phase,
        }
    }

    pub(crate) fn with_phase(&self, phase: IndexPhase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_deref()
    }

    /// The index, or [`RetrievalError::IndexUnavailable`] naming the phase
    pub fn require_index(&self) -> Result<&VectorIndex> {
        self.index().ok_or_else(|| {
            let reason = match self.phase {
                IndexPhase::Empty => "no chunk has a usable embedding",
                IndexPhase::Unbuilt => "index not built yet",
                IndexPhase::Building => "index build in progress",
                IndexPhase::Ready => "index missing",
            };
            RetrievalError::index_unavailable(reason)
        })
    }

    pub fn phase(&self) -> IndexPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> CorpusStats {
        let mut parts: BTreeMap<String, usize> = BTreeMap::new();
        let mut embedded = 0;
        let mut zero_filled = 0;
        for chunk in self.chunks.iter() {
            *parts.entry(chunk.metadata.part.clone()).or_insert(0) += 1;
            if chunk.embedding.is_some() {
                if chunk.fallback {
                    zero_filled += 1;
                } else {
                    embedded += 1;
                }
            }
        }

        CorpusStats {
            chunks: self.chunks.len(),
            embedded,
            zero_filled,
            indexed: self.index.as_ref().map_or(0, |i| i.len()),
            dimension: self.index.as_ref().map(|i| i.dimension()),
            index_kind: self.index.as_ref().map(|i| i.kind()),
            phase: self.phase,
            parts,
        }
    }
}

/// Summary counts for logs and the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub chunks: usize,
    pub embedded: usize,
    pub zero_filled: usize,
    pub indexed: usize,
    pub dimension: Option<usize>,
    pub index_kind: Option<IndexKind>,
    pub phase: IndexPhase,
    /// Chunk count per part
    pub parts: BTreeMap<String, usize>,
}
