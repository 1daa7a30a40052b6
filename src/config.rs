use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size. Readers run concurrently under WAL; writes serialize.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub replace_existing: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default)]
    pub overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap: 0,
            separators: default_separators(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    500
}

/// Paragraph, line, sentence, word. A raw character cut always follows.
pub fn default_separators() -> Vec<String> {
    vec![
        "\n\n".to_string(),
        "\n".to_string(),
        ". ".to_string(),
        " ".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            base_url: default_base_url(),
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout() -> u64 {
    30
}

/// Similarity metric used to rank stored chunks against a query.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: Metric::Cosine,
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_chat_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: 0,
            timeout_secs: default_generation_timeout(),
            system_prompt: None,
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.1
}
fn default_generation_timeout() -> u64 {
    60
}

/// What delete operations do when the store fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeleteErrorPolicy {
    /// Log the failure and report success.
    #[default]
    Swallow,
    /// Surface the failure to the caller.
    Propagate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
    #[serde(default)]
    pub delete_errors: DeleteErrorPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: default_store_timeout(),
            delete_errors: DeleteErrorPolicy::Swallow,
        }
    }
}

fn default_store_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:4004".to_string()
}

/// Upper bound for every `*timeout_secs` setting.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

fn check_timeout(name: &str, secs: u64) -> Result<()> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        anyhow::bail!("{} must be in [1, {}], got {}", name, MAX_TIMEOUT_SECS, secs);
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate db
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }
    if config.db.busy_timeout_secs > MAX_TIMEOUT_SECS {
        anyhow::bail!("db.busy_timeout_secs must be <= {}", MAX_TIMEOUT_SECS);
    }

    // Validate chunking
    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.max_chunk_size ({})",
            config.chunking.overlap,
            config.chunking.max_chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'openai'");
            }
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or local.",
            other
        ),
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.generation.max_tokens == 0 {
        anyhow::bail!("generation.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    // Validate timeouts
    check_timeout("embedding.timeout_secs", config.embedding.timeout_secs)?;
    check_timeout("generation.timeout_secs", config.generation.timeout_secs)?;
    check_timeout("service.store_timeout_secs", config.service.store_timeout_secs)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/jobpost.sqlite"

[source]
path = "./data/grounding.txt"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{}\n{}", MINIMAL, extra))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.chunking.max_chunk_size, 500);
        assert_eq!(cfg.chunking.overlap, 0);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.retrieval.metric, Metric::Cosine);
        assert_eq!(cfg.embedding.max_retries, 0);
        assert_eq!(cfg.generation.max_tokens, 1000);
        assert_eq!(cfg.service.delete_errors, DeleteErrorPolicy::Swallow);
        assert_eq!(cfg.db.max_connections, 5);
        assert_eq!(cfg.db.busy_timeout_secs, 5);
        assert_eq!(cfg.embedding.provider, "disabled");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = parse("[chunking]\nmax_chunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_openai_embedding_requires_dims_and_model() {
        let err = parse("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").unwrap_err();
        assert!(err.to_string().contains("dims"));

        let err = parse("[embedding]\nprovider = \"openai\"\ndims = 8\n").unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse("[embedding]\nprovider = \"nope\"\n").is_err());
        assert!(parse("[generation]\nprovider = \"nope\"\n").is_err());
    }

    #[test]
    fn test_metric_and_policy_parse() {
        let cfg = parse(
            "[retrieval]\nmetric = \"l2\"\ntop_k = 5\n[service]\ndelete_errors = \"propagate\"\n",
        )
        .unwrap();
        assert_eq!(cfg.retrieval.metric, Metric::L2);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.service.delete_errors, DeleteErrorPolicy::Propagate);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: Config =
            toml::from_str(include_str!("../config/jobpost.example.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.server.bind, "127.0.0.1:4004");
    }

    #[test]
    fn test_db_pool_settings() {
        let text = MINIMAL.replace(
            "path = \"./data/jobpost.sqlite\"",
            "path = \"./data/jobpost.sqlite\"\nmax_connections = 0",
        );
        let config: Config = toml::from_str(&text).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let err = parse("[embedding]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("embedding.timeout_secs"));
        let err = parse("[generation]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("generation.timeout_secs"));
        let err = parse("[service]\nstore_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("service.store_timeout_secs"));
    }

    #[test]
    fn test_oversized_timeouts_rejected() {
        let err = parse("[embedding]\nbatch_size = 1\ntimeout_secs = 9223372036854775807\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.timeout_secs"));
        assert!(parse("[generation]\ntimeout_secs = 3601\n").is_err());
        assert!(parse("[service]\nstore_timeout_secs = 86400\n").is_err());
        assert!(parse("[embedding]\ntimeout_secs = 3600\n").is_ok());
    }

    #[test]
    fn test_temperature_range() {
        assert!(parse("[generation]\ntemperature = 2.5\n").is_err());
    }
}
