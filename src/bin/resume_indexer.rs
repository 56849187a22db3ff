use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use resume_rag::config::{OpenAiArgs, PineconeArgs, RetryArgs};
use resume_rag::vector_store::MAX_UPSERT_BATCH;
use resume_rag::{logging, Corpus, Indexer, IndexerOptions, Retrying};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "resume-indexer",
    about = "Chunk, embed and upsert the experience corpus into the vector index"
)]
struct IndexCli {
    /// Path to the experience corpus JSON
    #[arg(long, env = "RESUME_RAG_CORPUS", default_value = "resume-data.json")]
    corpus: PathBuf,

    /// Records per upsert call (at most 100)
    #[arg(long, env = "RESUME_RAG_BATCH", default_value_t = MAX_UPSERT_BATCH)]
    batch_size: usize,

    /// Embedding requests kept in flight
    #[arg(long, env = "RESUME_RAG_EMBED_CONCURRENCY", default_value_t = 1)]
    embed_concurrency: usize,

    /// Force debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    pinecone: PineconeArgs,

    #[command(flatten)]
    retry: RetryArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = IndexCli::parse();
    logging::init(cli.verbose);

    let corpus = Corpus::from_path(&cli.corpus)
        .with_context(|| format!("failed to load corpus {:?}", cli.corpus))?;
    let policy = cli.retry.policy();
    let embedder = Retrying::new(
        cli.openai.build().context("invalid embedding configuration")?,
        policy,
    );
    let index = Retrying::new(
        cli.pinecone
            .connect()
            .await
            .context("invalid vector index configuration")?,
        policy,
    );

    let options = IndexerOptions {
        batch_size: cli.batch_size,
        embed_concurrency: cli.embed_concurrency,
    };
    let report = Indexer::new(embedder, index, options)
        .index_corpus(&corpus)
        .await
        .context("indexing run failed")?;

    info!(
        experiences = report.experiences,
        chunks = report.chunks,
        batches = report.batches,
        dimension = ?report.dimension,
        "corpus indexed"
    );
    for summary in &report.per_experience {
        info!("{summary}");
    }
    Ok(())
}
