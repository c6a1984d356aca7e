//! Decomposition configuration
//!
//! Layered: defaults, then an optional JSON file, then `METRIC_DECOMP_*`
//! environment variables (a `.env` file is honoured), then CLI flags applied
//! by the caller.

use crate::core::decomposition::{DEFAULT_LABEL_SEPARATOR, DEFAULT_TOP_K};
use crate::dataset::DimensionSpec;
use crate::error::{DecompError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_DIMENSIONS: &str = "METRIC_DECOMP_DIMENSIONS";
pub const ENV_TOP_K: &str = "METRIC_DECOMP_TOP_K";
pub const ENV_LABEL_SEPARATOR: &str = "METRIC_DECOMP_LABEL_SEPARATOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Dimension names, in output column order
    pub dimensions: Vec<String>,

    /// Rows reported per effect column
    pub top_k: usize,

    /// Joins dimension values into display labels
    pub label_separator: String,

    /// Where reports are written when no explicit path is given
    pub output_dir: Option<PathBuf>,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            dimensions: vec!["country".to_string()],
            top_k: DEFAULT_TOP_K,
            label_separator: DEFAULT_LABEL_SEPARATOR.to_string(),
            output_dir: None,
        }
    }
}

impl DecompositionConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: DecompositionConfig = serde_json::from_str(&content)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dimensions) = lookup(ENV_DIMENSIONS) {
            self.dimensions = DimensionSpec::parse(&dimensions)?.names().to_vec();
        }
        if let Some(top_k) = lookup(ENV_TOP_K) {
            self.top_k = top_k.trim().parse().map_err(|_| {
                DecompError::Config(format!("{} must be a positive integer, got '{}'", ENV_TOP_K, top_k))
            })?;
        }
        if let Some(separator) = lookup(ENV_LABEL_SEPARATOR) {
            self.label_separator = separator;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(DecompError::Config("top_k must be at least 1".to_string()));
        }
        self.dimension_spec().map(|_| ())
    }

    pub fn dimension_spec(&self) -> Result<DimensionSpec> {
        DimensionSpec::new(self.dimensions.iter().cloned())
    }
}
