//! TOML configuration.
//!
//! ```toml
//! [storage]
//! root = "./data"
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//! dims = 384
//!
//! [search]
//! default_limit = 5
//!
//! [clustering]
//! min_k = 2
//! max_k = 10
//! validity_index = "silhouette"
//!
//! [logging]
//! default = "warn"
//! ```
//!
//! Every table is optional; omitted fields take the defaults below.
//! [`load_config`] parses and validates, [`Config::minimal`] builds the
//! in-code default for commands that run without a file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use docshelf_core::cluster::{index_by_name, ClusterParams, KMeansOptions};

/// Provider names accepted in `[embedding] provider`.
pub const PROVIDERS: &[&str] = &["disabled", "hash", "local", "openai", "ollama"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Holds `registry.json` and one directory per database.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL, Ollama only.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Provider that needs no model download or network, for tests.
    pub fn hash(dims: usize) -> Self {
        Self {
            provider: "hash".to_string(),
            model: Some("feature-hash".to_string()),
            dims: Some(dims),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    #[serde(default = "default_min_k")]
    pub min_k: usize,
    #[serde(default = "default_max_k")]
    pub max_k: usize,
    #[serde(default = "default_validity_index")]
    pub validity_index: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_k: default_min_k(),
            max_k: default_max_k(),
            validity_index: default_validity_index(),
            seed: default_seed(),
            n_init: default_n_init(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_min_k() -> usize {
    2
}
fn default_max_k() -> usize {
    10
}
fn default_validity_index() -> String {
    "silhouette".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_n_init() -> usize {
    10
}
fn default_max_iterations() -> usize {
    300
}

impl ClusteringConfig {
    pub fn params(&self) -> ClusterParams {
        ClusterParams::range(self.min_k, self.max_k)
    }

    pub fn kmeans_options(&self) -> KMeansOptions {
        KMeansOptions {
            seed: self.seed,
            n_init: self.n_init,
            max_iterations: self.max_iterations,
        }
    }
}

/// Logging levels: a default plus per-module overrides.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Defaults for every table, rooted at `./data`.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Defaults rooted at `root` with the given embedding settings.
    pub fn with_root(root: impl Into<PathBuf>, embedding: EmbeddingConfig) -> Self {
        Self {
            storage: StorageConfig { root: root.into() },
            embedding,
            ..Self::default()
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.storage.root.join("registry.json")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if !PROVIDERS.contains(&config.embedding.provider.as_str()) {
        bail!(
            "Unknown embedding provider: '{}'. Must be one of: {}.",
            config.embedding.provider,
            PROVIDERS.join(", ")
        );
    }

    // Local models know their own dims; remote and hash providers need it spelled out.
    if config.embedding.is_enabled()
        && config.embedding.provider != "local"
        && matches!(config.embedding.dims, None | Some(0))
    {
        bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.search.default_limit < 1 {
        bail!("search.default_limit must be >= 1");
    }

    let clustering = &config.clustering;
    if clustering.min_k < 1 {
        bail!("clustering.min_k must be >= 1");
    }
    if clustering.min_k > clustering.max_k {
        bail!(
            "clustering.min_k ({}) must be <= clustering.max_k ({})",
            clustering.min_k,
            clustering.max_k
        );
    }
    if clustering.n_init < 1 {
        bail!("clustering.n_init must be >= 1");
    }
    if clustering.max_iterations < 1 {
        bail!("clustering.max_iterations must be >= 1");
    }
    if index_by_name(&clustering.validity_index).is_none() {
        bail!(
            "Unknown clustering.validity_index: '{}'. Must be silhouette or davies-bouldin.",
            clustering.validity_index
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.storage.root, PathBuf::from("./data"));
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.clustering.min_k, 2);
        assert_eq!(config.clustering.max_k, 10);
        assert_eq!(config.clustering.validity_index, "silhouette");
        assert_eq!(config.logging.default, "warn");
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
            [storage]
            root = "/tmp/shelf"

            [embedding]
            provider = "hash"
            model = "feature-hash"
            dims = 64

            [clustering]
            min_k = 3
            max_k = 6
            validity_index = "davies-bouldin"
            seed = 7

            [logging]
            default = "info"
            [logging.modules]
            docshelf = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.dims, Some(64));
        assert_eq!(config.clustering.params(), ClusterParams::range(3, 6));
        assert_eq!(config.clustering.kmeans_options().seed, 7);
        assert_eq!(config.logging.modules["docshelf"], "debug");
        assert_eq!(config.registry_path(), PathBuf::from("/tmp/shelf/registry.json"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse("[embedding]\nprovider = \"bogus\"").is_err());
        assert!(parse("[embedding]\nprovider = \"hash\"").is_err());
        assert!(parse("[embedding]\nprovider = \"openai\"\ndims = 8").is_err());
        assert!(parse("[search]\ndefault_limit = 0").is_err());
        assert!(parse("[clustering]\nmin_k = 5\nmax_k = 2").is_err());
        assert!(parse("[clustering]\nmin_k = 0").is_err());
        assert!(parse("[clustering]\nn_init = 0").is_err());
        assert!(parse("[clustering]\nvalidity_index = \"gap\"").is_err());
    }

    #[test]
    fn test_disabled_needs_no_dims() {
        let config = parse("[embedding]\nprovider = \"disabled\"").unwrap();
        assert!(!config.embedding.is_enabled());
    }
}
