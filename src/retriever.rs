//! Query-time retrieval and prompt-context rendering.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::info;

use crate::embedder::Embedder;
use crate::error::{IndexError, RetrievalError};
use crate::vector_store::{QueryMatch, VectorIndex};

/// Matches requested when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// Rendered in place of a context block when nothing matched.
pub const NO_RELEVANT_EXPERIENCE: &str = "No specific relevant experience found.";

/// A retrieved achievement, narrowed from the store's match shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedExperience {
    /// Similarity reported by the store.
    pub score: f32,
    /// Job title.
    pub role: String,
    /// Employer.
    pub company: String,
    /// Free-form tenure.
    pub duration: String,
    /// Area of work.
    pub category: String,
    /// Skills listed on the experience.
    pub skills: Vec<String>,
    /// Matched achievement.
    pub achievement: String,
    /// Text that was embedded for the match.
    pub full_text: String,
}

impl RetrievedExperience {
    fn from_match(hit: QueryMatch) -> Result<Self, IndexError> {
        let metadata = hit.metadata.ok_or_else(|| {
            IndexError::Malformed(format!("match {} returned without metadata", hit.id))
        })?;
        Ok(Self {
            score: hit.score,
            role: metadata.role,
            company: metadata.company,
            duration: metadata.duration,
            category: metadata.category,
            skills: metadata.skills,
            achievement: metadata.achievement,
            full_text: metadata.full_text,
        })
    }
}

/// Embeds a query and pulls the closest achievements from the index.
///
/// Issues exactly one embedding call and one index query per retrieval.
pub struct Retriever<E, S> {
    embedder: E,
    index: S,
}

impl<E: Embedder, S: VectorIndex> Retriever<E, S> {
    /// Binds the retriever to its clients.
    pub fn new(embedder: E, index: S) -> Self {
        Self { embedder, index }
    }

    /// Returns up to `top_k` experiences in the store's ranking order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedExperience>, RetrievalError> {
        let vector = self.embedder.embed(query).await?;
        let matches = self.index.query(&vector, top_k.max(1), true).await?;
        let experiences = matches
            .into_iter()
            .map(RetrievedExperience::from_match)
            .collect::<Result<Vec<_>, _>>()?;
        info!(top_k, found = experiences.len(), "retrieved relevant experience");
        Ok(experiences)
    }
}

/// Renders retrieved experiences as a block ready to splice into a prompt.
pub fn format_for_prompt(experiences: &[RetrievedExperience]) -> String {
    if experiences.is_empty() {
        return NO_RELEVANT_EXPERIENCE.to_string();
    }
    let mut out = String::from("RELEVANT BACKGROUND:\n\n");
    for (position, exp) in experiences.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{}. {} at {} ({})\n   Skills: {}\n   Achievement: {}\n   Relevance Score: {}\n\n",
            position + 1,
            exp.role,
            exp.company,
            exp.duration,
            exp.skills.join(", "),
            exp.achievement,
            format_score(exp.score)
        );
    }
    out
}

/// Score as a percentage with one fractional digit, e.g. `0.8234` → `82.3%`.
pub fn format_score(score: f32) -> String {
    format!("{:.1}%", f64::from(score) * 100.0)
}
