//! Run provenance: what was run, on which config and data, and what it wrote.
//!
//! Every command writes `run_meta.json` next to its artifacts. Config and data
//! are identified by BLAKE3 hashes so a rerun can be checked byte-for-byte.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use s3a_core::domain::{ConfigHash, DataHash};
use s3a_core::StrategyConfig;
use serde::{Deserialize, Serialize};

use crate::export::{write_json, ExportError};

pub const RUN_META_FILE: &str = "run_meta.json";

/// Default run id: local wall clock, `YYYYMMDD_HHMMSS`.
pub fn new_run_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProvenance {
    pub path: String,
    /// Hash of the canonical JSON form of the parsed config.
    pub hash: ConfigHash,
    pub dump: StrategyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProvenance {
    pub path: String,
    pub size_bytes: u64,
    pub hash: DataHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub cmd: String,
    pub run_id: String,
    pub argv: Vec<String>,
    pub outputs_dir: String,
    pub timestamp_utc: DateTime<Utc>,
    pub seed: Option<u64>,
    pub config: Option<ConfigProvenance>,
    pub data: Option<DataProvenance>,
    /// Artifact file name to path.
    pub artifacts: BTreeMap<String, String>,
    /// Command-specific parameters (date bounds, window sizes, path counts).
    pub params: BTreeMap<String, serde_json::Value>,
}

impl RunMeta {
    pub fn new(cmd: &str, run_id: &str, argv: Vec<String>, outputs_dir: &Path) -> Self {
        Self {
            cmd: cmd.to_string(),
            run_id: run_id.to_string(),
            argv,
            outputs_dir: outputs_dir.display().to_string(),
            timestamp_utc: Utc::now(),
            seed: None,
            config: None,
            data: None,
            artifacts: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, path: &Path, cfg: &StrategyConfig) -> Result<Self, ExportError> {
        self.config = Some(ConfigProvenance {
            path: path.display().to_string(),
            hash: cfg.config_hash()?,
            dump: cfg.clone(),
        });
        Ok(self)
    }

    pub fn with_data(mut self, path: &Path, size_bytes: u64, hash: DataHash) -> Self {
        self.data = Some(DataProvenance {
            path: path.display().to_string(),
            size_bytes,
            hash,
        });
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn param(&mut self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.params.insert(key.to_string(), value);
    }

    pub fn artifact(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.artifacts.insert(name, path.display().to_string());
    }

    /// Write `run_meta.json` into `dir` and return its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(RUN_META_FILE);
        write_json(&path, self)?;
        Ok(path)
    }
}
