//! Layered configuration for the indexing and search pipeline.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::CodeloomError;
use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeloomConfig {
    /// Path to the single on-disk database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for CodeloomConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("codeloom")
        .join("codeloom.db")
}

/// Batch-size and limits configuration for the indexing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexingConfig {
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: i64,

    #[serde(default = "default_batch_size")]
    pub batch_size: i32,

    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: i32,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size_bytes(),
            batch_size: default_batch_size(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

impl IndexingConfig {
    /// Ensure values are positive to prevent division-by-zero and overflow
    /// when cast to unsigned batch-slice lengths.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_bytes <= 0 {
            return Err(CodeloomError::Config {
                field: "indexing.max_file_size_bytes".to_string(),
                cause: format!("must be positive, got {}", self.max_file_size_bytes),
            });
        }
        if self.batch_size <= 0 {
            return Err(CodeloomError::Config {
                field: "indexing.batch_size".to_string(),
                cause: format!("must be positive, got {}", self.batch_size),
            });
        }
        if self.embed_batch_size <= 0 {
            return Err(CodeloomError::Config {
                field: "indexing.embed_batch_size".to_string(),
                cause: format!("must be positive, got {}", self.embed_batch_size),
            });
        }
        Ok(())
    }
}

fn default_max_file_size_bytes() -> i64 {
    1_000_000
}
fn default_batch_size() -> i32 {
    200
}
fn default_embed_batch_size() -> i32 {
    64
}

/// Search and rank-fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    #[serde(default = "default_text_weight")]
    pub text_weight: f32,

    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    #[serde(default = "default_limit")]
    pub default_limit: i32,

    #[serde(default)]
    pub default_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            text_weight: default_text_weight(),
            vector_weight: default_vector_weight(),
            default_limit: default_limit(),
            default_threshold: 0.0,
        }
    }
}

fn default_rrf_k() -> f32 {
    60.0
}
fn default_text_weight() -> f32 {
    0.4
}
fn default_vector_weight() -> f32 {
    0.6
}
fn default_limit() -> i32 {
    5
}

/// Non-fatal configuration advisory, returned by `validate_soft`.
#[derive(Debug, Clone)]
pub enum ConfigWarning {
    WeightSumNotOne { actual: f32 },
    InvalidValue { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::WeightSumNotOne { actual } => {
                write!(f, "search weights sum to {actual:.2}, expected 1.0")
            }
            ConfigWarning::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{field}': {reason}")
            }
        }
    }
}

impl CodeloomConfig {
    /// Load configuration, preferring project-level over global over defaults.
    ///
    /// Search order (first found wins):
    /// 1. `{workdir}/.codeloom/config.toml`
    /// 2. `~/.codeloom/config.toml`
    /// 3. Built-in default.
    pub fn load(workdir: &Path) -> Result<Self> {
        let project_config = workdir.join(".codeloom/config.toml");
        if project_config.exists() {
            return Self::from_file(&project_config);
        }

        if let Some(home) = dirs::home_dir() {
            let global_config = home.join(".codeloom/config.toml");
            if global_config.exists() {
                return Self::from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| CodeloomError::ConfigParse {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        config.indexing.validate()?;
        Ok(config)
    }

    /// Soft advisories that don't prevent construction but indicate a
    /// likely misconfiguration.
    pub fn validate_soft(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let total_weight = self.search.text_weight + self.search.vector_weight;
        if (total_weight - 1.0).abs() > 0.01 {
            warnings.push(ConfigWarning::WeightSumNotOne {
                actual: total_weight,
            });
        }
        if self.search.default_limit <= 0 {
            warnings.push(ConfigWarning::InvalidValue {
                field: "search.default_limit",
                reason: format!("must be > 0, got {}", self.search.default_limit),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let config = CodeloomConfig::default();
        assert!(config.validate_soft().is_empty());
    }

    #[test]
    fn mismatched_weights_produce_warning() {
        let mut config = CodeloomConfig::default();
        config.search.text_weight = 0.9;
        config.search.vector_weight = 0.9;
        let warnings = config.validate_soft();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn indexing_validate_rejects_zero_batch_size() {
        let mut indexing = IndexingConfig::default();
        indexing.batch_size = 0;
        assert!(indexing.validate().is_err());
    }

    #[test]
    fn load_from_missing_dirs_falls_back_to_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = CodeloomConfig::load(dir.path()).unwrap();
        assert_eq!(config, CodeloomConfig::default());
    }

    #[test]
    fn from_file_parses_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = \"/tmp/x.db\"\n[search]\ndefault_limit = 10\n").unwrap();
        let config = CodeloomConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.search.default_limit, 10);
    }
}
