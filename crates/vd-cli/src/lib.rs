//! vecdiff CLI library
//!
//! Configuration discovery, error rendering and console reporting for the
//! `vecdiff` binary. The testing logic itself lives in `vd_harness`.

pub mod config;
pub mod diagnostics;
pub mod report;

pub use vd_harness;

// CLI-specific error handling
pub mod error {
    use thiserror::Error;
    use vd_harness::HarnessError;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error(transparent)]
        Harness(#[from] HarnessError),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
