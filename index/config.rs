use crate::partition::{Assignment, PartitionError, ScanPlan};
use crate::window::{WindowError, WindowSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write scan configuration: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML scan configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize scan configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Scan configuration describes an invalid window: {0}")]
    Window(#[from] WindowError),
    #[error("Scan configuration cannot be partitioned: {0}")]
    Partition(#[from] PartitionError),
}

/// A partitioning job: window geometry, sequence length, and worker layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub window: u64,
    pub step: u64,
    /// Number of positions in the scanned sequence.
    pub n_sites: u64,
    /// Worker count; all logical CPUs when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default)]
    pub assignment: Assignment,
    /// Accept `step > window`, leaving gaps between windows uncompared.
    #[serde(default)]
    pub allow_gaps: bool,
}

impl ScanConfig {
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn spec(&self) -> Result<WindowSpec, ConfigError> {
        let spec = if self.allow_gaps {
            WindowSpec::with_gaps(self.window, self.step)?
        } else {
            WindowSpec::new(self.window, self.step)?
        };
        Ok(spec)
    }

    pub fn plan(&self) -> Result<ScanPlan, ConfigError> {
        self.worker_count()?;
        Ok(ScanPlan::new(self.spec()?, self.n_sites)?)
    }

    /// Explicit worker count, or all logical CPUs. An explicit zero is rejected.
    pub fn worker_count(&self) -> Result<usize, ConfigError> {
        match self.workers {
            Some(0) => Err(PartitionError::InvalidWorker {
                worker: 0,
                workers: 0,
            }
            .into()),
            Some(workers) => Ok(workers),
            None => Ok(num_cpus::get()),
        }
    }
}
