//! Deterministic in-memory provider for tests and offline runs

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::provider::EmbeddingProvider;
use crate::error::{Result, RetrievalError};

/// Provider returning scripted vectors.
///
/// Texts without a scripted vector get a deterministic vector derived from
/// their bytes. Batches can be made to fail or come back short.
#[derive(Debug, Default)]
pub struct StaticProvider {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_on: HashSet<String>,
    max_response_len: Mutex<Option<usize>>,
    unreachable: AtomicBool,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Return `vector` whenever `text` is embedded
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Fail any batch that contains `text`
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on.insert(text.into());
        self
    }

    /// Truncate every response to at most `len` vectors
    pub fn with_max_response_len(self, len: usize) -> Self {
        self.set_max_response_len(Some(len));
        self
    }

    /// Change or lift the response truncation
    pub fn set_max_response_len(&self, len: Option<usize>) {
        *self.max_response_len.lock() = len;
    }

    /// Make every call fail as if the network were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of provider calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn derived_vector(&self, text: &str) -> Vec<f32> {
        let seed = text
            .bytes()
            .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        (0..self.dimension)
            .map(|i| ((seed.wrapping_add(i as u32 * 7919)) % 997) as f32 / 997.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for StaticProvider {
    fn model(&self) -> &str {
        "static"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RetrievalError::provider_unavailable("connection refused"));
        }
        if let Some(text) = texts.iter().find(|t| self.fail_on.contains(t.as_str())) {
            return Err(RetrievalError::provider(format!(
                "scripted failure on {:?}",
                text
            )));
        }

        let mut vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| self.derived_vector(text))
            })
            .collect();
        if let Some(len) = *self.max_response_len.lock() {
            vectors.truncate(len);
        }
        Ok(vectors)
    }
}
