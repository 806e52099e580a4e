//! Error types for vd-harness

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that abort a whole run.
///
/// Tool failures inside a single test case are not errors; they become a
/// failed [`crate::driver::CaseOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid test pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to build launcher {source_file} (launch code '{launch_code}'): {reason}")]
    LauncherBuild {
        source_file: PathBuf,
        launch_code: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

