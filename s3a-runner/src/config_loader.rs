//! Strategy config files: TOML on disk to a validated [`StrategyConfig`].

use std::path::Path;

use s3a_core::{ConfigError, StrategyConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// Parse and validate a TOML document. Missing sections take their defaults;
/// unknown keys are rejected.
pub fn from_toml_str(content: &str) -> Result<StrategyConfig, ConfigLoadError> {
    let cfg: StrategyConfig = toml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load a config file. Returns the validated config and the raw text, which
/// run metadata keeps alongside the config hash.
pub fn load_config(path: &Path) -> Result<(StrategyConfig, String), ConfigLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let cfg = from_toml_str(&content)?;
    Ok((cfg, content))
}
