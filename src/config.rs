use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub dbdir: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Where the sentence-embedding model lives on disk and how to run it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: String,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Token limit; longer overviews are truncated.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
    /// Load at startup instead of on the first request.
    #[serde(default = "default_true")]
    pub preload: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            model_file: default_model_file(),
            tokenizer_file: default_tokenizer_file(),
            dimension: default_dimension(),
            max_length: default_max_length(),
            intra_threads: default_intra_threads(),
            preload: true,
        }
    }
}

impl ModelConfig {
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.model_file)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.tokenizer_file)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Only recommend movies whose genres match the requested movie exactly.
    #[serde(default)]
    pub filter_by_genre: bool,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            filter_by_genre: false,
        }
    }
}

fn default_port() -> String {
    "52773".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_model_dir() -> String {
    "./models/all-MiniLM-L6-v2".to_string()
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_max_length() -> usize {
    256
}

fn default_intra_threads() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_string(), e))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recommend.limit == 0 {
            return Err(ConfigError::Invalid("recommend.limit must be at least 1".into()));
        }
        if self.model.dimension == 0 {
            return Err(ConfigError::Invalid("model.dimension must be at least 1".into()));
        }
        if self.model.max_length == 0 {
            return Err(ConfigError::Invalid("model.max_length must be at least 1".into()));
        }
        Ok(())
    }

    pub fn get_database_path(&self) -> Option<String> {
        if let Some(ref sqlite) = self.database.sqlite {
            return Some(sqlite.filename.clone());
        }

        if let Some(ref dbdir) = self.dbdir {
            let path = PathBuf::from(dbdir).join("filmes.db");
            return Some(path.to_string_lossy().to_string());
        }

        None
    }

    pub fn max_connections(&self) -> u32 {
        self.database
            .sqlite
            .as_ref()
            .map(|s| s.max_connections)
            .unwrap_or_else(default_max_connections)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
