//! Nearest-neighbor index over chunk embeddings
//!
//! The default backend is an exact flat L2 scan. An approximate HNSW graph
//! (instant-distance) is available for large corpora. Only chunks that
//! carry an embedding are indexed, so the index keeps its own
//! ordinal -> chunk position table.

use instant_distance::{Builder, HnswMap, Point, Search};

use crate::chunk::Chunk;
use crate::config::{DistanceMetric, IndexKind, IndexOptions};
use crate::error::{Result, RetrievalError};

/// HNSW point wrapper
#[derive(Clone)]
struct IndexPoint {
    vector: Vec<f32>,
}

impl Point for IndexPoint {
    fn distance(&self, other: &Self) -> f32 {
        squared_l2(&self.vector, &other.vector)
    }
}

enum Backend {
    Flat,
    Hnsw(HnswMap<IndexPoint, usize>),
}

/// One hit from a nearest-neighbor lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position inside the index
    pub ordinal: usize,
    /// Position of the source chunk in the corpus
    pub chunk: usize,
    pub distance: f32,
}

/// Immutable nearest-neighbor index
pub struct VectorIndex {
    dimension: usize,
    metric: DistanceMetric,
    ef_search: usize,
    /// Row-major `len x dimension` matrix of indexed vectors
    matrix: Vec<f32>,
    /// ordinal -> chunk position
    positions: Vec<usize>,
    backend: Backend,
}

impl VectorIndex {
    /// Build an index over every chunk with a usable embedding.
    ///
    /// Returns `None` when nothing qualifies. Zero-vector fallbacks are
    /// skipped unless `options.include_fallback` is set. The first indexed
    /// vector fixes the dimension; vectors of another length are skipped.
    pub fn build(chunks: &[Chunk], options: &IndexOptions) -> Option<Self> {
        let eligible = |chunk: &&Chunk| options.include_fallback || !chunk.fallback;

        let dimension = chunks
            .iter()
            .filter(eligible)
            .find_map(|c| c.embedding.as_ref().map(Vec::len))?;

        let mut matrix = Vec::new();
        let mut positions = Vec::new();
        let mut excluded_fallback = 0;
        for (position, chunk) in chunks.iter().enumerate() {
            let Some(embedding) = chunk.embedding.as_ref() else {
                continue;
            };
            if chunk.fallback && !options.include_fallback {
                excluded_fallback += 1;
                continue;
            }
            if embedding.len() != dimension {
                log::warn!(
                    "Chunk {} has a {}d embedding, index is {}d; not indexed",
                    position,
                    embedding.len(),
                    dimension
                );
                continue;
            }
            matrix.extend_from_slice(embedding);
            positions.push(position);
        }

        if positions.is_empty() {
            return None;
        }
        if excluded_fallback > 0 {
            log::info!(
                "Excluded {} zero-fallback chunks from the index",
                excluded_fallback
            );
        }

        let backend = match options.kind {
            IndexKind::Flat => Backend::Flat,
            IndexKind::Hnsw => {
                let points: Vec<IndexPoint> = matrix
                    .chunks_exact(dimension)
                    .map(|row| IndexPoint {
                        vector: row.to_vec(),
                    })
                    .collect();
                let ordinals: Vec<usize> = (0..points.len()).collect();
                let hnsw = Builder::default()
                    .ef_construction(options.ef_construction)
                    .ef_search(options.ef_search)
                    .seed(42)
                    .build(points, ordinals);
                Backend::Hnsw(hnsw)
            }
        };

        log::info!(
            "Vector index built: {} vectors, {}d, {:?}",
            positions.len(),
            dimension,
            options.kind
        );

        Some(Self {
            dimension,
            metric: options.metric,
            ef_search: options.ef_search,
            matrix,
            positions,
            backend,
        })
    }

    /// Find up to `k` nearest vectors, closest first.
    ///
    /// `k` is capped at the number of indexed vectors. Ties keep ordinal
    /// order on the flat backend.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = match &self.backend {
            Backend::Hnsw(hnsw) if k <= self.ef_search => {
                let query_point = IndexPoint {
                    vector: query.to_vec(),
                };
                let mut search = Search::default();
                hnsw.search(&query_point, &mut search)
                    .take(k)
                    .map(|item| (*item.value, item.distance))
                    .collect()
            }
            _ => self.exact_scan(query, k),
        };

        Ok(hits
            .into_iter()
            .map(|(ordinal, squared)| Neighbor {
                ordinal,
                chunk: self.positions[ordinal],
                distance: match self.metric {
                    DistanceMetric::SquaredEuclidean => squared,
                    DistanceMetric::Euclidean => squared.sqrt(),
                },
            })
            .collect())
    }

    fn exact_scan(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .matrix
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(query, row))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn kind(&self) -> IndexKind {
        match self.backend {
            Backend::Flat => IndexKind::Flat,
            Backend::Hnsw(_) => IndexKind::Hnsw,
        }
    }
}

/// Squared Euclidean distance; mismatched lengths compare over the shorter
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
