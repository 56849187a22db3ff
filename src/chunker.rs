//! Turns experiences into embeddable chunks, one per achievement.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{Corpus, Experience, ExperienceId};
use crate::embedder::EmbeddingVector;
use crate::vector_store::{IndexRecord, RecordMetadata};

/// One achievement of one experience, rendered as embeddable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Run-wide counter value, dense from zero.
    pub id: usize,
    /// Text submitted to the embedding model.
    pub text: String,
    /// Experience the achievement belongs to.
    pub experience_id: ExperienceId,
    /// Job title.
    pub role: String,
    /// Employer.
    pub company: String,
    /// Free-form tenure, e.g. `2020-2022`.
    pub duration: String,
    /// Area of work.
    pub category: String,
    /// Skills listed on the experience.
    pub skills: Vec<String>,
    /// The single achievement this chunk carries.
    pub achievement: String,
}

impl Chunk {
    /// Identifier used for the vector store record.
    pub fn record_id(&self) -> String {
        format!("chunk_{}", self.id)
    }

    /// Flattened metadata stored next to the vector.
    pub fn metadata(&self) -> RecordMetadata {
        RecordMetadata {
            experience_id: self.experience_id.to_string(),
            role: self.role.clone(),
            company: self.company.clone(),
            duration: self.duration.clone(),
            category: self.category.clone(),
            skills: self.skills.clone(),
            achievement: self.achievement.clone(),
            full_text: self.text.clone(),
        }
    }

    /// Pairs the chunk with its embedding.
    pub fn into_record(self, vector: EmbeddingVector) -> IndexRecord {
        IndexRecord {
            id: self.record_id(),
            values: vector,
            metadata: self.metadata(),
        }
    }
}

/// Renders the fixed template embedded for every achievement.
pub fn render_chunk_text(experience: &Experience, achievement: &str) -> String {
    format!(
        "Role: {}\nCompany: {}\nDuration: {}\nCategory: {}\nSkills: {}\nAchievement: {}",
        experience.role,
        experience.company,
        experience.duration,
        experience.category,
        experience.skills.join(", "),
        achievement
    )
    .trim()
    .to_string()
}

/// Assigns chunk ids in corpus order across however many experiences it is fed.
#[derive(Debug, Default)]
pub struct Chunker {
    next_id: usize,
}

impl Chunker {
    /// Starts a fresh run at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks produced so far.
    pub fn produced(&self) -> usize {
        self.next_id
    }

    /// Produces one chunk per achievement, in achievement order.
    pub fn chunk_experience(&mut self, experience: &Experience) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(experience.achievements.len());
        for achievement in &experience.achievements {
            let id = self.next_id;
            self.next_id += 1;
            chunks.push(Chunk {
                id,
                text: render_chunk_text(experience, achievement),
                experience_id: experience.id.clone(),
                role: experience.role.clone(),
                company: experience.company.clone(),
                duration: experience.duration.clone(),
                category: experience.category.clone(),
                skills: experience.skills.clone(),
                achievement: achievement.clone(),
            });
        }
        info!(
            role = %experience.role,
            company = %experience.company,
            chunks = chunks.len(),
            "chunked experience"
        );
        chunks
    }

    /// Chunks every experience of a corpus.
    pub fn chunk_corpus(&mut self, corpus: &Corpus) -> Vec<Chunk> {
        corpus
            .experiences
            .iter()
            .flat_map(|experience| self.chunk_experience(experience))
            .collect()
    }
}
