//! Benchmark configuration: JSON file defaults overridden by CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tally_core::device::ParseDeviceError;
use tally_core::Device;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Device(#[from] ParseDeviceError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Largest accepted `max_value`; the reference histogram holds
/// `max_value + 1` i64 buckets (8 GiB at this bound).
pub const MAX_VALUE_LIMIT: i64 = 1 << 30;

/// Settings for `tally bench`. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// `cpu`, `cuda` or `cuda:N`.
    pub device: String,
    /// Matrix rows for the column_max runs.
    pub rows: usize,
    /// Matrix columns for the column_max runs.
    pub cols: usize,
    /// Vector length for the counting runs.
    pub len: usize,
    /// Counted values are drawn from `0..=max_value`.
    pub max_value: i64,
    pub iters: usize,
    pub warmup: usize,
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            device: "cpu".into(),
            rows: 4096,
            cols: 512,
            len: 1_000_000,
            max_value: 1000,
            iters: 20,
            warmup: 3,
            seed: 42,
        }
    }
}

/// Flag values that replace file values when given.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct BenchArgs {
    /// JSON config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Device to benchmark on: cpu, cuda or cuda:N
    #[arg(long)]
    pub device: Option<String>,
    /// Matrix rows
    #[arg(long)]
    pub rows: Option<usize>,
    /// Matrix columns
    #[arg(long)]
    pub cols: Option<usize>,
    /// Length of the counted vector
    #[arg(long)]
    pub len: Option<usize>,
    /// Largest counted value
    #[arg(long)]
    pub max_value: Option<i64>,
    /// Timed iterations per op
    #[arg(long)]
    pub iters: Option<usize>,
    /// Untimed warmup iterations per op
    #[arg(long)]
    pub warmup: Option<usize>,
    /// RNG seed for input generation
    #[arg(long)]
    pub seed: Option<u64>,
}

impl BenchConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Load the file named by `args.config` (or defaults), apply the flag
    /// overrides, then validate.
    pub fn resolve(args: &BenchArgs) -> Result<Self, ConfigError> {
        let mut cfg = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply(args);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply(&mut self, args: &BenchArgs) {
        if let Some(device) = &args.device {
            self.device = device.clone();
        }
        if let Some(v) = args.rows {
            self.rows = v;
        }
        if let Some(v) = args.cols {
            self.cols = v;
        }
        if let Some(v) = args.len {
            self.len = v;
        }
        if let Some(v) = args.max_value {
            self.max_value = v;
        }
        if let Some(v) = args.iters {
            self.iters = v;
        }
        if let Some(v) = args.warmup {
            self.warmup = v;
        }
        if let Some(v) = args.seed {
            self.seed = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device()?;
        if !(0..=MAX_VALUE_LIMIT).contains(&self.max_value) {
            return Err(ConfigError::Invalid(format!(
                "max_value must be in 0..={}, got {}",
                MAX_VALUE_LIMIT, self.max_value
            )));
        }
        if self.iters == 0 {
            return Err(ConfigError::Invalid("iters must be at least 1".into()));
        }
        Ok(())
    }

    pub fn device(&self) -> Result<Device, ConfigError> {
        Ok(self.device.parse()?)
    }
}
