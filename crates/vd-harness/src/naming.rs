//! Deterministic build-artifact paths.
//!
//! Every path here is a pure function of its inputs; nothing touches the
//! filesystem except [`ArtifactLayout::ensure_dirs`].

use crate::case::{LauncherFamily, Mode};
use crate::config::LayoutConfig;
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};

/// File name with the directory and everything from the first `.` removed.
///
/// `suite/foo.bar.c` becomes `foo`.
pub fn base_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => file_name,
    }
}

/// Directory layout for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    build_dir: PathBuf,
    logs_dir: PathBuf,
    launcher_dir: PathBuf,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl ArtifactLayout {
    pub fn new(
        build_dir: impl Into<PathBuf>,
        logs_dir: impl Into<PathBuf>,
        launcher_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            build_dir: build_dir.into(),
            logs_dir: logs_dir.into(),
            launcher_dir: launcher_dir.into(),
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(&config.build_dir, &config.logs_dir, &config.launcher_dir)
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Create the build and log directories; existing directories are fine.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.build_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir).map_err(|source| HarnessError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn scalar_ir_path(&self, src_file: &Path) -> PathBuf {
        self.build_dir.join(format!("{}.ll", base_name(src_file)))
    }

    pub fn transformed_ir_path(&self, src_file: &Path, mode: Mode) -> PathBuf {
        self.build_dir
            .join(format!("{}.{}.ll", base_name(src_file), mode.artifact_suffix()))
    }

    pub fn transformed_asm_path(&self, src_file: &Path, mode: Mode) -> PathBuf {
        self.build_dir
            .join(format!("{}.{}.s", base_name(src_file), mode.artifact_suffix()))
    }

    /// Log prefix for the vectorizer run on `src_file`.
    pub fn transform_log_prefix(&self, src_file: &Path, mode: Mode) -> PathBuf {
        self.logs_dir
            .join(format!("{}.{}", base_name(src_file), mode.artifact_suffix()))
    }

    /// Log prefix for front-end compilation of `src_file`.
    pub fn frontend_log_prefix(&self, src_file: &Path) -> PathBuf {
        self.logs_dir.join(format!("{}.frontend", base_name(src_file)))
    }

    pub fn log_prefix(&self, name: &str) -> PathBuf {
        self.logs_dir.join(name)
    }

    pub fn launcher_source_path(&self, family: LauncherFamily, launch_code: &str) -> PathBuf {
        self.launcher_dir
            .join(format!("{}_{}.cpp", family.prefix(), launch_code))
    }

    /// Shared by every case requesting the same family and launch code.
    ///
    /// Keyed by family as well as launch code on purpose, so `verify_<code>`
    /// and `loopverify_<code>` never overwrite each other.
    pub fn launcher_ir_path(&self, family: LauncherFamily, launch_code: &str) -> PathBuf {
        self.build_dir
            .join(format!("{}_{}.ll", family.prefix(), launch_code))
    }

    /// `build/verify_<case>.bin`, or `build/verify_<case>.<variant>.bin`.
    pub fn launcher_binary_path(&self, case_name: &str, variant: Option<&str>) -> PathBuf {
        let file_name = match variant {
            Some(variant) => format!("verify_{case_name}.{variant}.bin"),
            None => format!("verify_{case_name}.bin"),
        };
        self.build_dir.join(file_name)
    }
}
