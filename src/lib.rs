#![warn(missing_docs)]
//! Retrieval layer over a career-achievement corpus: chunking, embedding,
//! vector indexing, and prompt-context rendering for interview questions.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod questions;
pub mod retriever;
pub mod retry;
pub mod server;
pub mod vector_store;

pub use chunker::{Chunk, Chunker};
pub use corpus::{Corpus, Experience, ExperienceId};
pub use embedder::{Embedder, EmbeddingVector};
pub use error::{
    ConfigError, CorpusError, EmbeddingError, GenerationError, IndexError, IndexingError,
    RetrievalError, Transient,
};
pub use indexer::{IndexReport, Indexer, IndexerOptions};
pub use questions::{GeneratedQuestions, InterviewCoach, QuestionModel};
pub use retriever::{format_for_prompt, RetrievedExperience, Retriever, DEFAULT_TOP_K};
pub use retry::{RetryPolicy, Retrying};
pub use vector_store::{IndexRecord, QueryMatch, RecordMetadata, VectorIndex};
