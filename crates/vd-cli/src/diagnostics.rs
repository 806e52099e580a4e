//! Diagnostic and error reporting utilities

use crate::{CliError, Result};
use miette::Diagnostic;
use thiserror::Error;
use vd_harness::HarnessError;

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// Errors that stop a run, with hints on where to look next.
#[derive(Error, Debug, Diagnostic)]
pub enum RunDiagnostic {
    #[error("Launcher {source_file} for launch code '{launch_code}' does not build: {reason}")]
    #[diagnostic(
        code(vecdiff::launcher),
        help("Every case with this launch code needs the launcher; fix it or move those cases aside")
    )]
    LauncherBuild {
        source_file: String,
        launch_code: String,
        reason: String,
    },

    #[error("Invalid test pattern '{pattern}': {message}")]
    #[diagnostic(
        code(vecdiff::pattern),
        help("Patterns use glob syntax, e.g. 'suite/*.c*'")
    )]
    InvalidPattern { pattern: String, message: String },

    #[error("{message}")]
    #[diagnostic(
        code(vecdiff::config),
        help("Check vecdiff.toml (or the file given with --config) for correct syntax and values")
    )]
    Config { message: String },
}

impl RunDiagnostic {
    pub fn from_cli_error(err: &CliError) -> Option<Self> {
        match err {
            CliError::Harness(HarnessError::LauncherBuild {
                source_file,
                launch_code,
                reason,
            }) => Some(RunDiagnostic::LauncherBuild {
                source_file: source_file.display().to_string(),
                launch_code: launch_code.clone(),
                reason: reason.clone(),
            }),
            CliError::Harness(HarnessError::InvalidPattern { pattern, message }) => {
                Some(RunDiagnostic::InvalidPattern {
                    pattern: pattern.clone(),
                    message: message.clone(),
                })
            }
            CliError::Harness(HarnessError::Config(message)) | CliError::Config(message) => {
                Some(RunDiagnostic::Config {
                    message: message.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Render `err` as a miette report on stderr. Returns false if it has no
/// diagnostic form and the caller should log it instead.
pub fn render_cli_error(err: &CliError) -> bool {
    match RunDiagnostic::from_cli_error(err) {
        Some(diagnostic) => {
            eprintln!("{:?}", miette::Report::new(diagnostic));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_launcher_error_has_diagnostic() {
        let err = CliError::Harness(HarnessError::LauncherBuild {
            source_file: PathBuf::from("launcher/verify_chk.cpp"),
            launch_code: "chk".to_string(),
            reason: "front end exit code 1".to_string(),
        });

        let diagnostic = RunDiagnostic::from_cli_error(&err).unwrap();
        let text = diagnostic.to_string();
        assert!(text.contains("launcher/verify_chk.cpp"));
        assert!(text.contains("'chk'"));
        assert_eq!(
            diagnostic.code().map(|code| code.to_string()),
            Some("vecdiff::launcher".to_string())
        );
    }

    #[test]
    fn test_io_error_is_left_to_logging() {
        let err = CliError::Io(std::io::Error::other("disk on fire"));
        assert!(RunDiagnostic::from_cli_error(&err).is_none());
    }
}
