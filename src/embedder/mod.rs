//! Embedding clients and provider-shape normalization.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::EmbeddingError;

/// Canonical embedding representation used everywhere past the provider boundary.
pub type EmbeddingVector = Vec<f32>;

/// Text-to-vector client.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds one piece of text.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError>;

    /// Dimension the client is configured to produce, when known up front.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for &T {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        (**self).embed(text).await
    }

    fn dimensions(&self) -> Option<usize> {
        (**self).dimensions()
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        (**self).embed(text).await
    }

    fn dimensions(&self) -> Option<usize> {
        (**self).dimensions()
    }
}

/// Shapes a provider may hand back for one embedding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawEmbedding {
    /// Plain JSON number array.
    Floats(Vec<f64>),
    /// Base64 of a packed little-endian `f32` buffer.
    Packed(String),
}

/// Converts any provider shape into an ordered `f32` sequence of the same length.
pub fn normalize_embedding(raw: RawEmbedding) -> Result<EmbeddingVector, EmbeddingError> {
    let vector: EmbeddingVector = match raw {
        RawEmbedding::Floats(values) => values.into_iter().map(|value| value as f32).collect(),
        RawEmbedding::Packed(encoded) => {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|err| EmbeddingError::Malformed(format!("invalid base64: {err}")))?;
            if bytes.len() % 4 != 0 {
                return Err(EmbeddingError::Malformed(format!(
                    "packed buffer of {} bytes is not a whole number of f32 values",
                    bytes.len()
                )));
            }
            bytes
                .chunks_exact(4)
                .map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]]))
                .collect()
        }
    };
    if vector.is_empty() {
        return Err(EmbeddingError::Malformed("empty embedding".into()));
    }
    if let Some(position) = vector.iter().position(|value| !value.is_finite()) {
        return Err(EmbeddingError::Malformed(format!(
            "non-finite value at position {position}"
        )));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn plain_sequence_keeps_order_and_length() {
        let vector = normalize_embedding(RawEmbedding::Floats(vec![0.5, -1.0, 0.25])).unwrap();
        assert_eq!(vector, vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn packed_buffer_keeps_order_and_length() {
        let values = [0.125_f32, -3.5, 7.0, 0.0];
        let vector = normalize_embedding(RawEmbedding::Packed(pack(&values))).unwrap();
        assert_eq!(vector, values.to_vec());
    }

    #[test]
    fn both_shapes_agree() {
        let values = [0.1_f32, 0.2, 0.3];
        let floats = RawEmbedding::Floats(values.iter().map(|v| f64::from(*v)).collect());
        assert_eq!(
            normalize_embedding(floats).unwrap(),
            normalize_embedding(RawEmbedding::Packed(pack(&values))).unwrap()
        );
    }

    #[test]
    fn untagged_json_picks_the_right_shape() {
        let floats: RawEmbedding = serde_json::from_str("[1.0, 2.0]").unwrap();
        assert!(matches!(floats, RawEmbedding::Floats(_)));
        let packed: RawEmbedding = serde_json::from_str("\"AACAPw==\"").unwrap();
        assert_eq!(normalize_embedding(packed).unwrap(), vec![1.0]);
    }

    #[test]
    fn rejects_empty_and_ragged_buffers() {
        assert!(matches!(
            normalize_embedding(RawEmbedding::Floats(Vec::new())),
            Err(EmbeddingError::Malformed(_))
        ));
        let ragged = STANDARD.encode([0u8, 1, 2]);
        assert!(matches!(
            normalize_embedding(RawEmbedding::Packed(ragged)),
            Err(EmbeddingError::Malformed(_))
        ));
        assert!(normalize_embedding(RawEmbedding::Packed("not base64!".into())).is_err());
    }
}
