//! Vector index clients: batched upsert and top-K similarity query.

pub mod memory;
pub mod pinecone;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::embedder::EmbeddingVector;
use crate::error::IndexError;

/// Largest batch the remote store accepts per upsert call.
pub const MAX_UPSERT_BATCH: usize = 100;

/// Flattened chunk fields stored next to each vector.
///
/// Carries everything needed to render a prompt line without the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Source experience id.
    pub experience_id: String,
    /// Job title.
    pub role: String,
    /// Employer.
    pub company: String,
    /// Free-form tenure.
    pub duration: String,
    /// Area of work.
    pub category: String,
    /// Skills listed on the experience.
    #[serde(deserialize_with = "skills_from_list_or_joined")]
    pub skills: Vec<String>,
    /// Achievement text.
    pub achievement: String,
    /// Exact text that was embedded.
    pub full_text: String,
}

// Older indexes stored skills as one comma-joined string.
fn skills_from_list_or_joined<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Skills {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Skills::deserialize(deserializer)? {
        Skills::List(list) => list,
        Skills::Joined(joined) if joined.trim().is_empty() => Vec::new(),
        Skills::Joined(joined) => joined.split(", ").map(str::to_string).collect(),
    })
}

/// One `(id, vector, metadata)` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Record id, `chunk_<n>`.
    pub id: String,
    /// Embedding vector.
    pub values: EmbeddingVector,
    /// Payload returned with query matches.
    pub metadata: RecordMetadata,
}

/// One ranked hit from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record id, `chunk_<n>`.
    pub id: String,
    /// Similarity as reported by the store; higher is closer.
    pub score: f32,
    /// Payload, present when requested.
    #[serde(default)]
    pub metadata: Option<RecordMetadata>,
}

/// Remote vector store bound to a single index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Writes one batch of at most [`MAX_UPSERT_BATCH`] records in a single call.
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError>;

    /// Returns at most `top_k` matches in descending score order.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError>;

    /// Upserts any number of records as consecutive batches, one at a time.
    ///
    /// Stops at the first failing batch; earlier batches stay committed.
    /// Returns the number of batches issued.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
        let mut batches = 0usize;
        for batch in records.chunks(MAX_UPSERT_BATCH) {
            self.upsert_batch(batch).await?;
            batches += 1;
            info!(batch = batches, records = batch.len(), "upserted batch");
        }
        Ok(batches)
    }
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for &T {
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
        (**self).upsert_batch(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        (**self).query(vector, top_k, include_metadata).await
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
        (**self).upsert(records).await
    }
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for Arc<T> {
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
        (**self).upsert_batch(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        (**self).query(vector, top_k, include_metadata).await
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, IndexError> {
        (**self).upsert(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingIndex {
        batches: Mutex<Vec<Vec<String>>>,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
            let mut batches = self.batches.lock().unwrap();
            if self.fail_on_batch == Some(batches.len()) {
                return Err(IndexError::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            batches.push(records.iter().map(|r| r.id.clone()).collect());
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _include_metadata: bool,
        ) -> Result<Vec<QueryMatch>, IndexError> {
            Ok(Vec::new())
        }
    }

    fn metadata() -> RecordMetadata {
        RecordMetadata {
            experience_id: "1".into(),
            role: "PM".into(),
            company: "Acme".into(),
            duration: "2020-2022".into(),
            category: "Growth".into(),
            skills: vec!["SQL".into()],
            achievement: "Did a thing".into(),
            full_text: "Role: PM".into(),
        }
    }

    fn records(count: usize) -> Vec<IndexRecord> {
        (0..count)
            .map(|i| IndexRecord {
                id: format!("chunk_{i}"),
                values: vec![1.0, 0.0],
                metadata: metadata(),
            })
            .collect()
    }

    #[tokio::test]
    async fn splits_into_ordered_batches() {
        for len in [0usize, 1, 99, 100, 101, 250] {
            let index = RecordingIndex::default();
            let input = records(len);
            let issued = index.upsert(&input).await.unwrap();

            let batches = index.batches.lock().unwrap();
            assert_eq!(issued, len.div_ceil(MAX_UPSERT_BATCH));
            assert_eq!(batches.len(), issued);
            assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= MAX_UPSERT_BATCH));
            let flattened: Vec<String> = batches.iter().flatten().cloned().collect();
            let expected: Vec<String> = input.iter().map(|r| r.id.clone()).collect();
            assert_eq!(flattened, expected);
        }
    }

    #[tokio::test]
    async fn failing_batch_leaves_earlier_batches_committed() {
        let index = RecordingIndex {
            fail_on_batch: Some(1),
            ..Default::default()
        };
        let err = index.upsert(&records(250)).await.unwrap_err();
        assert!(matches!(err, IndexError::Api { status: 500, .. }));
        let batches = index.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), MAX_UPSERT_BATCH);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let value = serde_json::to_value(metadata()).unwrap();
        assert_eq!(value["experienceId"], "1");
        assert_eq!(value["fullText"], "Role: PM");
        assert_eq!(value["skills"], json!(["SQL"]));
    }

    #[test]
    fn metadata_round_trips_exactly() {
        let mut original = metadata();
        original.skills = vec!["C, C++".into(), "A/B testing".into()];
        original.achievement = "Grew ARR by 40% — in 6 months".into();
        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: RecordMetadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn accepts_legacy_joined_skills() {
        let decoded: RecordMetadata = serde_json::from_value(json!({
            "experienceId": "1",
            "role": "PM",
            "company": "Acme",
            "duration": "2020-2022",
            "category": "Growth",
            "skills": "SQL, A/B testing",
            "achievement": "Did a thing",
            "fullText": "Role: PM"
        }))
        .unwrap();
        assert_eq!(decoded.skills, vec!["SQL", "A/B testing"]);
    }
}
