use anyhow::{Context, Result};
use clap::Parser;
use resume_rag::config::{OpenAiArgs, PineconeArgs, RetryArgs};
use resume_rag::retriever::format_score;
use resume_rag::{format_for_prompt, logging, Retriever, Retrying, DEFAULT_TOP_K};

const DEFAULT_QUERIES: [(&str, &str); 3] = [
    (
        "Multimodal AI Role",
        "Staff PM requiring multimodal AI and computer vision experience with production ML systems",
    ),
    (
        "E-commerce Role",
        "Product Manager for e-commerce platform with growth and experimentation experience",
    ),
    (
        "Technical AI PM",
        "Technical PM with RAG architecture and LLM evaluation expertise",
    ),
];

const PREVIEW_CHARS: usize = 80;

#[derive(Parser, Debug)]
#[command(
    name = "retrieval-check",
    about = "Run job-description queries against the index and print what comes back"
)]
struct CheckCli {
    /// Job description to query with; repeat for several. Defaults to a built-in set.
    #[arg(long = "query", short = 'q')]
    queries: Vec<String>,

    /// Matches per query
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Also print the prompt context block for each query
    #[arg(long, default_value_t = false)]
    show_context: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    pinecone: PineconeArgs,

    #[command(flatten)]
    retry: RetryArgs,
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CheckCli::parse();
    logging::init(cli.verbose);

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
    let retriever = Retriever::new(embedder, index);

    let cases: Vec<(String, String)> = if cli.queries.is_empty() {
        DEFAULT_QUERIES
            .iter()
            .map(|(name, query)| (name.to_string(), query.to_string()))
            .collect()
    } else {
        cli.queries
            .iter()
            .enumerate()
            .map(|(i, query)| (format!("Query {}", i + 1), query.clone()))
            .collect()
    };

    for (name, query) in &cases {
        println!("TEST: {name}");
        println!("Job Description: \"{query}\"\n");
        let results = retriever
            .retrieve(query, cli.top_k)
            .await
            .with_context(|| format!("retrieval failed for {name}"))?;
        if results.is_empty() {
            println!("(no matches)\n");
        }
        for (i, exp) in results.iter().enumerate() {
            println!("{}. {} at {}", i + 1, exp.role, exp.company);
            println!("   Relevance: {}", format_score(exp.score));
            println!("   Category: {}", exp.category);
            println!("   Achievement: {}\n", preview(&exp.achievement));
        }
        if cli.show_context {
            println!("{}", format_for_prompt(&results));
        }
        println!("{}\n", "-".repeat(42));
    }
    Ok(())
}
