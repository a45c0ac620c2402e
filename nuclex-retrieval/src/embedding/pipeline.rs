//! Batched corpus embedding
//!
//! Sends chunk text to the provider in fixed-size batches and writes the
//! vectors back by position. A failed batch never aborts the run.

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use super::engine::EmbeddingEngine;
use crate::chunk::Chunk;
use crate::error::{Result, RetrievalError};

/// Counters from one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingReport {
    /// Batches sent to the provider
    pub batches: usize,
    /// Batches whose provider call failed outright
    pub failed_batches: usize,
    /// Chunks that received a real embedding
    pub embedded: usize,
    /// Chunks given a zero vector because the response had no usable entry
    pub zero_filled: usize,
    /// Chunks whose vector had the wrong length and were left unembedded
    pub dimension_mismatches: usize,
}

impl EmbeddingReport {
    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0 && self.zero_filled == 0 && self.dimension_mismatches == 0
    }
}

/// Computes embeddings for chunks that do not have one yet
pub struct EmbeddingPipeline {
    engine: Arc<EmbeddingEngine>,
    batch_size: usize,
    max_concurrent: usize,
}

struct BatchOutcome {
    number: usize,
    positions: Vec<usize>,
    result: Result<Vec<Vec<f32>>>,
}

impl EmbeddingPipeline {
    pub fn new(engine: Arc<EmbeddingEngine>, batch_size: usize, max_concurrent: usize) -> Self {
        Self {
            engine,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Embed every chunk that has no embedding or only a zero-vector
    /// fallback.
    ///
    /// Batches may complete in any order; each vector is assigned to the
    /// chunk at the position it was sent for. A fallback chunk whose retry
    /// fails keeps its zero vector.
    pub async fn run(&self, chunks: &mut [Chunk]) -> EmbeddingReport {
        let pending: Vec<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| chunk.embedding.is_none() || chunk.fallback)
            .map(|(i, _)| i)
            .collect();

        let mut report = EmbeddingReport::default();
        if pending.is_empty() {
            return report;
        }

        let batches: Vec<(Vec<usize>, Vec<String>)> = pending
            .chunks(self.batch_size)
            .map(|positions| {
                let texts = positions
                    .iter()
                    .map(|&i| chunks[i].content.clone())
                    .collect();
                (positions.to_vec(), texts)
            })
            .collect();
        let total = batches.len();
        report.batches = total;

        log::info!(
            "Computing embeddings for {} chunks in {} batches",
            pending.len(),
            total
        );

        let engine = &self.engine;
        let outcomes: Vec<BatchOutcome> = stream::iter(batches.into_iter().enumerate())
            .map(|(number, (positions, texts))| async move {
                log::info!("Processing batch {}/{}", number + 1, total);
                let start = positions.first().copied().unwrap_or_default();
                let result = embed_batch_at(engine, start, &texts).await;
                BatchOutcome {
                    number,
                    positions,
                    result,
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let dimension = self.engine.dimension();
        for outcome in outcomes {
            self.apply(chunks, outcome, dimension, &mut report);
        }

        log::info!(
            "Embeddings computed: {} embedded, {} zero-filled, {} mismatched, {}/{} batches failed",
            report.embedded,
            report.zero_filled,
            report.dimension_mismatches,
            report.failed_batches,
            report.batches
        );
        report
    }

    fn apply(
        &self,
        chunks: &mut [Chunk],
        outcome: BatchOutcome,
        dimension: usize,
        report: &mut EmbeddingReport,
    ) {
        let vectors = match outcome.result {
            Ok(vectors) => vectors,
            Err(e) => {
                log::warn!(
                    "Batch {} ({} chunks): {}",
                    outcome.number + 1,
                    outcome.positions.len(),
                    e
                );
                report.failed_batches += 1;
                return;
            }
        };

        if vectors.len() != outcome.positions.len() {
            log::warn!(
                "Batch {} returned {} embeddings for {} inputs",
                outcome.number + 1,
                vectors.len(),
                outcome.positions.len()
            );
        }

        let mut vectors = vectors.into_iter();
        for &position in &outcome.positions {
            let chunk = &mut chunks[position];
            match vectors.next() {
                Some(vector) if vector.len() == dimension => {
                    chunk.embedding = Some(vector);
                    chunk.fallback = false;
                    report.embedded += 1;
                }
                Some(vector) if !vector.is_empty() => {
                    log::warn!(
                        "Chunk {} ({} {}): embedding has {} components, expected {}; skipping",
                        position,
                        chunk.metadata.part,
                        chunk.metadata.section,
                        vector.len(),
                        dimension
                    );
                    report.dimension_mismatches += 1;
                }
                _ => {
                    log::warn!(
                        "Chunk {}: no usable embedding in response, using zero vector",
                        position
                    );
                    chunk.set_zero_fallback(dimension);
                    report.zero_filled += 1;
                }
            }
        }
    }
}

/// One provider call; failures carry the position of the batch's first chunk
async fn embed_batch_at(
    engine: &EmbeddingEngine,
    start: usize,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    engine
        .embed_batch(texts)
        .await
        .map_err(|e| RetrievalError::embedding_batch(start, e.to_string()))
}
