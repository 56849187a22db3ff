//! Interview-question generation grounded in retrieved experience.

pub mod anthropic;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::embedder::Embedder;
use crate::error::GenerationError;
use crate::retriever::{format_for_prompt, RetrievedExperience, Retriever, DEFAULT_TOP_K};
use crate::vector_store::VectorIndex;

/// Questions kept from a completion.
pub const MAX_QUESTIONS: usize = 5;

/// A text-completion backend.
#[async_trait]
pub trait QuestionModel: Send + Sync {
    /// Returns the model's text reply to a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: QuestionModel + ?Sized> QuestionModel for &T {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).complete(prompt).await
    }
}

#[async_trait]
impl<T: QuestionModel + ?Sized> QuestionModel for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).complete(prompt).await
    }
}

/// Grounds a job description with the rendered experience block.
pub fn build_prompt(job_description: &str, context: &str) -> String {
    format!(
        "You are helping me prepare for a Product Manager interview.

JOB DESCRIPTION:
{job_description}

{context}

Generate {MAX_QUESTIONS} behavioral interview questions that:
1. Are specific to the requirements in the job description
2. Reference my actual achievements and experience listed above where relevant
3. Use STAR format (Situation, Task, Action, Result)
4. Help me showcase the most relevant accomplishments for this role
5. Are not generic (\"Tell me about yourself\" type questions)

IMPORTANT: Make the questions SPECIFIC to both the job requirements AND my background.
For example, if the job requires AI experience and I built an AI system, ask about that specific system.

Format as a numbered list (1-{MAX_QUESTIONS})."
    )
}

/// Splits a numbered-list reply into bare questions, at most [`MAX_QUESTIONS`].
///
/// Numbering is only removed when it starts the line; an indented `3.` is kept.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| strip_numbering(line).trim())
        .filter(|line| !line.is_empty())
        .take(MAX_QUESTIONS)
        .map(str::to_string)
        .collect()
}

/// Removes a leading `12.` or `12)` marker.
fn strip_numbering(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix(|c: char| c == '.' || c == ')') {
        Some(rest) => rest,
        None => line,
    }
}

/// Questions plus the experience that grounded them.
#[derive(Debug, Clone)]
pub struct GeneratedQuestions {
    /// Parsed questions, numbering removed.
    pub questions: Vec<String>,
    /// Experiences rendered into the prompt, in rank order.
    pub experiences: Vec<RetrievedExperience>,
}

/// Retrieves context for a job description and asks the model for questions.
pub struct InterviewCoach<E, S, M> {
    retriever: Retriever<E, S>,
    model: M,
    top_k: usize,
}

impl<E: Embedder, S: VectorIndex, M: QuestionModel> InterviewCoach<E, S, M> {
    /// Pairs a retriever with a model; grounds on [`DEFAULT_TOP_K`] experiences.
    pub fn new(retriever: Retriever<E, S>, model: M) -> Self {
        Self {
            retriever,
            model,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Overrides how many experiences ground each prompt.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Retrieves context, prompts the model, and parses its reply.
    pub async fn generate(
        &self,
        job_description: &str,
    ) -> Result<GeneratedQuestions, GenerationError> {
        let experiences = self.retriever.retrieve(job_description, self.top_k).await?;
        let context = format_for_prompt(&experiences);
        let prompt = build_prompt(job_description, &context);
        let reply = self.model.complete(&prompt).await?;
        let questions = parse_questions(&reply);
        if questions.is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        info!(
            questions = questions.len(),
            grounded_on = experiences.len(),
            "generated interview questions"
        );
        Ok(GeneratedQuestions {
            questions,
            experiences,
        })
    }
}
