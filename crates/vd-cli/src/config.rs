//! Configuration discovery and command-line overrides

use crate::{CliError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use vd_harness::HarnessConfig;

pub const CONFIG_FILE_NAME: &str = "vecdiff.toml";

/// Places searched, in order, when no `--config` is given.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".vecdiff.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("vecdiff").join("config.toml"));
    }

    paths
}

/// Load configuration, falling back to defaults.
///
/// An explicit path must exist. Otherwise the first existing candidate wins;
/// a candidate that exists but does not parse is still an error.
pub fn load(config_path: Option<&Path>) -> Result<HarnessConfig> {
    if let Some(path) = config_path {
        if !path.is_file() {
            return Err(CliError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        debug!("Using config file {}", path.display());
        return Ok(HarnessConfig::load_from_file(path)?);
    }

    for candidate in candidate_paths() {
        if candidate.is_file() {
            debug!("Using config file {}", candidate.display());
            return Ok(HarnessConfig::load_from_file(&candidate)?);
        }
    }

    debug!("No config file found, using defaults");
    Ok(HarnessConfig::default())
}

/// Settings given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub patterns: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub jobs: Option<usize>,
    pub inspect: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut HarnessConfig) {
        if !self.patterns.is_empty() {
            config.run.patterns = self.patterns;
        }
        if self.timeout_secs.is_some() {
            config.run.timeout_secs = self.timeout_secs;
        }
        if let Some(jobs) = self.jobs {
            config.run.jobs = jobs;
        }
        if self.inspect {
            config.run.inspect = true;
        }
    }
}
