//! Harness configuration: tool locations, directory layout and run settings.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete harness configuration, usually loaded from `vecdiff.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// External tool locations and fixed compiler flags
    pub tools: ToolConfig,

    /// Where derived artifacts, logs and launcher sources live
    pub layout: LayoutConfig,

    /// Per-run settings
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// C front end driver
    pub c_compiler: String,

    /// C++ front end driver, also used for linking launchers
    pub cxx_compiler: String,

    /// Language standard passed to the C++ driver
    pub cxx_standard: String,

    /// Value of `-march=`
    pub march: String,

    /// Optimization level for every front end and link invocation
    pub opt_level: u8,

    /// Vectorizer executable
    pub vectorizer: String,

    /// Vectorizer shared library loaded as a compiler plugin
    pub plugin: PathBuf,

    /// Bitcode disassembler
    pub disassembler: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub build_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub launcher_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Glob patterns used when none are given on the command line
    pub patterns: Vec<String>,

    /// Name of the scalar function handed to the vectorizer with `-k`
    pub scalar_function: String,

    /// Deadline for each child process, in seconds
    pub timeout_secs: Option<u64>,

    /// Number of test cases processed concurrently
    pub jobs: usize,

    /// Emit native assembly of every transformed module
    pub inspect: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            c_compiler: "clang".to_string(),
            cxx_compiler: "clang++".to_string(),
            cxx_standard: "c++14".to_string(),
            march: "native".to_string(),
            opt_level: 2,
            vectorizer: "./../bin/rvTool".to_string(),
            plugin: PathBuf::from("../lib/libRV.so"),
            disassembler: "llvm-dis".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            logs_dir: PathBuf::from("logs"),
            launcher_dir: PathBuf::from("launcher"),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            patterns: vec!["suite/*.c*".to_string()],
            scalar_function: "foo".to_string(),
            timeout_secs: None,
            jobs: 1,
            inspect: false,
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn effective_jobs(&self) -> usize {
        self.jobs.max(1)
    }
}

impl HarnessConfig {
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content).map_err(|e| {
            HarnessError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.tools.c_compiler, "clang");
        assert_eq!(config.tools.opt_level, 2);
        assert_eq!(config.run.patterns, vec!["suite/*.c*".to_string()]);
        assert_eq!(config.run.scalar_function, "foo");
        assert_eq!(config.run.timeout(), None);
        assert_eq!(config.layout.build_dir, PathBuf::from("build"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = HarnessConfig::from_toml_str(
            r#"
[tools]
vectorizer = "/opt/rv/bin/rvTool"

[run]
timeout_secs = 30
jobs = 0
"#,
        )
        .unwrap();

        assert_eq!(config.tools.vectorizer, "/opt/rv/bin/rvTool");
        assert_eq!(config.tools.cxx_compiler, "clang++");
        assert_eq!(config.run.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.run.effective_jobs(), 1);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_load_from_file_reports_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("vecdiff.toml");
        std::fs::write(&path, "[run]\njobs = \"many\"\n").unwrap();

        let err = HarnessConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("vecdiff.toml"), "unexpected error: {err}");

        std::fs::write(&path, "[run]\njobs = 4\n").unwrap();
        let config = HarnessConfig::load_from_file(&path).unwrap();
        assert_eq!(config.run.jobs, 4);
    }

    #[test]
    fn test_config_serialization() {
        let config = HarnessConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let deserialized = HarnessConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }
}
