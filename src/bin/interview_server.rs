use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use resume_rag::config::{AnthropicArgs, OpenAiArgs, PineconeArgs, RetryArgs};
use resume_rag::server::{app, AppState, QuestionService};
use resume_rag::{logging, ConfigError, InterviewCoach, Retriever, Retrying, DEFAULT_TOP_K};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "interview-server",
    about = "HTTP API that generates interview questions grounded in retrieved experience"
)]
struct ServerCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "RESUME_RAG_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Experiences retrieved per job description.
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    pinecone: PineconeArgs,

    #[command(flatten)]
    anthropic: AnthropicArgs,

    #[command(flatten)]
    retry: RetryArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();
    logging::init(cli.verbose);

    // Health must answer even when generation cannot be wired up.
    let state = match build_coach(&cli).await {
        Ok(coach) => AppState::ready(coach),
        Err(err) => {
            warn!(error = %err, "question generation is disabled");
            AppState::unavailable(err.to_string(), cli.anthropic.key_configured())
        }
    };

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    info!("interview-server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app(state))
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn build_coach(cli: &ServerCli) -> Result<Arc<dyn QuestionService>, ConfigError> {
    let policy = cli.retry.policy();
    let model = Retrying::new(cli.anthropic.build()?, policy);
    let embedder = Retrying::new(cli.openai.build()?, policy);
    let index = Retrying::new(cli.pinecone.connect().await?, policy);
    let coach = InterviewCoach::new(Retriever::new(embedder, index), model).with_top_k(cli.top_k);
    Ok(Arc::new(coach))
}
