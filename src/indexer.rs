//! Build-time orchestration: corpus → chunks → embeddings → batched upserts.

use std::fmt;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::chunker::Chunker;
use crate::corpus::Corpus;
use crate::embedder::Embedder;
use crate::error::IndexingError;
use crate::vector_store::{IndexRecord, VectorIndex, MAX_UPSERT_BATCH};

/// Tunables for one indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Records accumulated before a flush; clamped to `1..=MAX_UPSERT_BATCH`.
    pub batch_size: usize,
    /// Embedding requests allowed in flight at once. `1` keeps the run sequential.
    pub embed_concurrency: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            batch_size: MAX_UPSERT_BATCH,
            embed_concurrency: 1,
        }
    }
}

/// Chunk count contributed by one experience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperienceSummary {
    /// Job title.
    pub role: String,
    /// Employer.
    pub company: String,
    /// Achievements chunked for this experience.
    pub chunks: usize,
}

impl fmt::Display for ExperienceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {} chunks", self.role, self.company, self.chunks)
    }
}

/// Outcome of a completed indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Experiences read from the corpus.
    pub experiences: usize,
    /// Chunks embedded and written.
    pub chunks: usize,
    /// Upsert calls made.
    pub batches: usize,
    /// Vector dimension written, `None` when the corpus had no achievements.
    pub dimension: Option<usize>,
    /// Chunk counts in corpus order.
    pub per_experience: Vec<ExperienceSummary>,
}

/// Drives chunking, embedding and upserting for a whole corpus.
pub struct Indexer<E, S> {
    embedder: E,
    index: S,
    options: IndexerOptions,
}

impl<E: Embedder, S: VectorIndex> Indexer<E, S> {
    /// Binds the indexer to its clients.
    pub fn new(embedder: E, index: S, options: IndexerOptions) -> Self {
        Self {
            embedder,
            index,
            options,
        }
    }

    /// Indexes every achievement of `corpus`.
    ///
    /// Pending records are flushed each time they reach the batch size, so a
    /// failure part-way through leaves the earlier batches in the store. There
    /// is no rollback.
    pub async fn index_corpus(&self, corpus: &Corpus) -> Result<IndexReport, IndexingError> {
        let batch_size = self.options.batch_size.clamp(1, MAX_UPSERT_BATCH);
        let concurrency = self.options.embed_concurrency.max(1);
        let chunks = Chunker::new().chunk_corpus(corpus);
        let total = chunks.len();
        info!(
            experiences = corpus.experiences.len(),
            chunks = total,
            batch_size,
            concurrency,
            "starting indexing run"
        );

        // `buffered` yields in submission order, so results stay paired with chunks.
        let embedder = &self.embedder;
        let mut embedded = stream::iter(chunks)
            .map(move |chunk| async move {
                let result = embedder.embed(&chunk.text).await;
                (chunk, result)
            })
            .buffered(concurrency);

        let mut dimension = self.embedder.dimensions();
        let mut pending: Vec<IndexRecord> = Vec::with_capacity(batch_size);
        let mut batches = 0usize;
        while let Some((chunk, result)) = embedded.next().await {
            let vector = result.map_err(|source| IndexingError::Embedding {
                chunk_id: chunk.id,
                source,
            })?;
            match dimension {
                Some(expected) if expected != vector.len() => {
                    return Err(IndexingError::DimensionMismatch {
                        chunk_id: chunk.id,
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(vector.len()),
            }
            debug!(chunk = chunk.id, total, "embedded chunk");
            pending.push(chunk.into_record(vector));
            if pending.len() >= batch_size {
                batches += self.index.upsert(&pending).await?;
                pending.clear();
            }
        }
        if !pending.is_empty() {
            batches += self.index.upsert(&pending).await?;
        }

        let per_experience = corpus
            .experiences
            .iter()
            .map(|experience| ExperienceSummary {
                role: experience.role.clone(),
                company: experience.company.clone(),
                chunks: experience.achievements.len(),
            })
            .collect();
        info!(chunks = total, batches, "indexing run complete");
        Ok(IndexReport {
            experiences: corpus.experiences.len(),
            chunks: total,
            batches,
            dimension: if total == 0 { None } else { dimension },
            per_experience,
        })
    }
}
