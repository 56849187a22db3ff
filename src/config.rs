//! Command-line and environment configuration shared by the binaries.

use std::time::Duration;

use clap::Args;

use crate::embedder::openai::{EncodingFormat, OpenAiEmbedder, DEFAULT_MODEL};
use crate::error::ConfigError;
use crate::questions::anthropic::{self, AnthropicModel};
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::vector_store::pinecone::{PineconeIndex, DEFAULT_CONTROL_PLANE};

/// Embedding provider settings.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key used for embedding calls
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(long, env = "RESUME_RAG_OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    /// Optional dimension override when supported by the model
    #[arg(long, env = "RESUME_RAG_OPENAI_DIMENSIONS")]
    pub openai_dimensions: Option<usize>,

    /// Base URL for the OpenAI-compatible API
    #[arg(
        long,
        env = "RESUME_RAG_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Wire encoding requested for embedding vectors
    #[arg(long, env = "RESUME_RAG_OPENAI_ENCODING", value_enum, default_value_t = EncodingFormat::Float)]
    pub openai_encoding: EncodingFormat,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "RESUME_RAG_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,
}

impl OpenAiArgs {
    /// Builds the embedding client; a missing key is a [`ConfigError`].
    pub fn build(&self) -> Result<OpenAiEmbedder, ConfigError> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        OpenAiEmbedder::new(
            api_key,
            &self.openai_base_url,
            self.openai_model.clone(),
            self.openai_dimensions,
            self.openai_encoding,
            Duration::from_secs(self.openai_timeout_secs.max(1)),
        )
    }
}

/// Vector index settings. Either the index name or its host must be given.
#[derive(Args, Debug, Clone)]
pub struct PineconeArgs {
    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: Option<String>,

    /// Index name, resolved to a host through the control plane
    #[arg(long, env = "PINECONE_INDEX")]
    pub pinecone_index: Option<String>,

    /// Data-plane host; skips the control-plane lookup when set
    #[arg(long, env = "PINECONE_INDEX_HOST")]
    pub pinecone_host: Option<String>,

    /// Control-plane endpoint used for host lookup
    #[arg(long, env = "PINECONE_CONTROL_PLANE", default_value = DEFAULT_CONTROL_PLANE)]
    pub pinecone_control_plane: String,

    /// Namespace records are written to and queried from
    #[arg(long, env = "PINECONE_NAMESPACE")]
    pub pinecone_namespace: Option<String>,

    /// Max seconds to wait for each index request
    #[arg(long, env = "RESUME_RAG_PINECONE_TIMEOUT_SECS", default_value_t = 30)]
    pub pinecone_timeout_secs: u64,
}

impl PineconeArgs {
    /// Builds the index client, resolving the host first if only a name was given.
    pub async fn connect(&self) -> Result<PineconeIndex, ConfigError> {
        let api_key = self
            .pinecone_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("PINECONE_API_KEY"))?;
        let timeout = Duration::from_secs(self.pinecone_timeout_secs.max(1));
        let namespace = self.pinecone_namespace.clone();
        match (&self.pinecone_host, &self.pinecone_index) {
            (Some(host), _) => PineconeIndex::new(api_key, host, namespace, timeout),
            (None, Some(name)) => {
                PineconeIndex::connect(
                    api_key,
                    &self.pinecone_control_plane,
                    name,
                    namespace,
                    timeout,
                )
                .await
            }
            (None, None) => Err(ConfigError::Missing("PINECONE_INDEX")),
        }
    }
}

/// Completion model settings.
#[derive(Args, Debug, Clone)]
pub struct AnthropicArgs {
    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Messages API model identifier
    #[arg(long, env = "RESUME_RAG_ANTHROPIC_MODEL", default_value = anthropic::DEFAULT_MODEL)]
    pub anthropic_model: String,

    /// Base URL for the Anthropic API
    #[arg(long, env = "RESUME_RAG_ANTHROPIC_BASE", default_value = anthropic::DEFAULT_BASE_URL)]
    pub anthropic_base_url: String,

    /// Upper bound on generated tokens per request
    #[arg(long, env = "RESUME_RAG_ANTHROPIC_MAX_TOKENS", default_value_t = anthropic::DEFAULT_MAX_TOKENS)]
    pub anthropic_max_tokens: usize,

    /// Max seconds to wait for each completion request
    #[arg(long, env = "RESUME_RAG_ANTHROPIC_TIMEOUT_SECS", default_value_t = 60)]
    pub anthropic_timeout_secs: u64,
}

impl AnthropicArgs {
    /// Whether a non-blank key was supplied.
    pub fn key_configured(&self) -> bool {
        self.anthropic_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Builds the completion client; a missing key is a [`ConfigError`].
    pub fn build(&self) -> Result<AnthropicModel, ConfigError> {
        let api_key = self
            .anthropic_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?;
        AnthropicModel::new(
            api_key,
            &self.anthropic_base_url,
            self.anthropic_model.clone(),
            self.anthropic_max_tokens,
            Duration::from_secs(self.anthropic_timeout_secs.max(1)),
        )
    }
}

/// Retry settings applied to every remote call.
#[derive(Args, Debug, Clone, Copy)]
pub struct RetryArgs {
    /// Attempts per call for rate limits or transient errors
    #[arg(long, env = "RESUME_RAG_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,

    /// Delay before the first retry; doubles per attempt
    #[arg(long, env = "RESUME_RAG_RETRY_BASE_DELAY_MS", default_value_t = 500)]
    pub retry_base_delay_ms: u64,
}

impl RetryArgs {
    /// Retry policy built from these flags.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        openai: OpenAiArgs,
        #[command(flatten)]
        pinecone: PineconeArgs,
        #[command(flatten)]
        anthropic: AnthropicArgs,
        #[command(flatten)]
        retry: RetryArgs,
    }

    fn parse(args: &[&str]) -> TestCli {
        TestCli::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn defaults_follow_the_hosted_services() {
        let cli = parse(&["--openai-api-key", "sk", "--pinecone-api-key", "pc"]);
        assert_eq!(cli.openai.openai_model, "text-embedding-3-small");
        assert_eq!(cli.openai.openai_encoding, EncodingFormat::Float);
        assert_eq!(cli.anthropic.anthropic_max_tokens, 1500);
        assert_eq!(cli.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn missing_openai_key_is_reported_by_name() {
        let mut cli = parse(&[]);
        cli.openai.openai_api_key = None;
        assert!(matches!(
            cli.openai.build(),
            Err(ConfigError::Missing("OPENAI_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn index_needs_a_name_or_host() {
        let mut cli = parse(&["--pinecone-api-key", "pc"]);
        cli.pinecone.pinecone_index = None;
        cli.pinecone.pinecone_host = None;
        assert!(matches!(
            cli.pinecone.connect().await,
            Err(ConfigError::Missing("PINECONE_INDEX"))
        ));

        cli.pinecone.pinecone_host = Some("resume-abc.svc.pinecone.io".into());
        let index = cli.pinecone.connect().await.unwrap();
        assert_eq!(index.base_url(), "https://resume-abc.svc.pinecone.io");
    }

    #[test]
    fn blank_anthropic_key_counts_as_unset() {
        let mut cli = parse(&[]);
        cli.anthropic.anthropic_api_key = Some("  ".into());
        assert!(!cli.anthropic.key_configured());
        cli.anthropic.anthropic_api_key = Some("ak".into());
        assert!(cli.anthropic.key_configured());
    }
}
