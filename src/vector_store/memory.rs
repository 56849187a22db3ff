//! In-process vector index with brute-force cosine ranking.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IndexRecord, QueryMatch, VectorIndex, MAX_UPSERT_BATCH};
use crate::error::IndexError;

/// Cosine similarity in `[-1, 1]`; `0.0` for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Default)]
struct Store {
    dimension: Option<usize>,
    records: BTreeMap<String, IndexRecord>,
}

/// Keeps records in memory and mirrors the remote store's contract:
/// upsert-by-id, a per-call batch limit, and one vector dimension per index.
#[derive(Default)]
pub struct InMemoryIndex {
    store: RwLock<Store>,
}

impl InMemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.store.read().await.records.len()
    }

    /// Whether the index holds no records.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.records.is_empty()
    }

    /// Fetches one record by id.
    pub async fn get(&self, id: &str) -> Option<IndexRecord> {
        self.store.read().await.records.get(id).cloned()
    }

    /// Dimension fixed by the first upserted vector.
    pub async fn dimension(&self) -> Option<usize> {
        self.store.read().await.dimension
    }
}

fn check_dimension(expected: Option<usize>, actual: usize) -> Result<(), IndexError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(IndexError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
        if records.len() > MAX_UPSERT_BATCH {
            return Err(IndexError::BatchTooLarge {
                len: records.len(),
                max: MAX_UPSERT_BATCH,
            });
        }
        let mut store = self.store.write().await;
        // Validate the whole batch first so a rejected batch writes nothing.
        let mut dimension = store.dimension;
        for record in records {
            check_dimension(dimension, record.values.len())?;
            dimension = Some(record.values.len());
        }
        store.dimension = dimension;
        for record in records {
            store.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let store = self.store.read().await;
        check_dimension(store.dimension, vector.len())?;
        let mut matches: Vec<QueryMatch> = store
            .records
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: include_metadata.then(|| record.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}
