//! Equivalence checking between scalar and vectorized code.
//!
//! Whole-function cases trust the launcher: it checks results internally and
//! reports through its exit status. Outer-loop cases run a scalar and a
//! vectorized binary and compare what each prints, byte for byte.

use crate::case::LauncherFamily;
use crate::error::Result;
use crate::launcher::LauncherCache;
use crate::process::Invocation;
use crate::toolchain::Toolchain;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which half of an outer-loop comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Scalar,
    Vectorized,
}

impl Side {
    pub fn variant(self) -> &'static str {
        match self {
            Side::Scalar => "scalar",
            Side::Vectorized => "loopvec",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// The scalar source did not lower to IR.
    FrontEnd(String),
    /// The vectorizer failed or timed out.
    Vectorizer(String),
    /// The vectorizer reported success but wrote nothing.
    MissingArtifact(PathBuf),
    Link(PathBuf),
    /// The whole-function launcher rejected the result.
    Launcher(String),
    /// One side produced no comparable output.
    NoOutput(Side),
    Mismatch { scalar: String, vectorized: String },
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::FrontEnd(status) => write!(f, "front end failed ({status})"),
            FailReason::Vectorizer(status) => write!(f, "vectorizer failed ({status})"),
            FailReason::MissingArtifact(path) => {
                write!(f, "vectorizer produced no {}", path.display())
            }
            FailReason::Link(binary) => write!(f, "could not link {}", binary.display()),
            FailReason::Launcher(status) => write!(f, "launcher reported {status}"),
            FailReason::NoOutput(side) => write!(f, "no output from {} run", side.variant()),
            FailReason::Mismatch { scalar, vectorized } => {
                write!(f, "output mismatch: scalar '{scalar}' vs loopvec '{vectorized}'")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(FailReason),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Outer-loop rule: pass iff both captures exist and are byte-equal.
pub fn compare_outputs(scalar: Option<&[u8]>, vectorized: Option<&[u8]>) -> Verdict {
    match (scalar, vectorized) {
        (None, _) => Verdict::Fail(FailReason::NoOutput(Side::Scalar)),
        (_, None) => Verdict::Fail(FailReason::NoOutput(Side::Vectorized)),
        (Some(scalar), Some(vectorized)) if scalar == vectorized => Verdict::Pass,
        (Some(scalar), Some(vectorized)) => Verdict::Fail(FailReason::Mismatch {
            scalar: digest_text(scalar),
            vectorized: digest_text(vectorized),
        }),
    }
}

fn digest_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

pub struct EquivalenceChecker<'a> {
    toolchain: &'a Toolchain,
    launchers: &'a LauncherCache,
}

impl<'a> EquivalenceChecker<'a> {
    pub fn new(toolchain: &'a Toolchain, launchers: &'a LauncherCache) -> Self {
        Self {
            toolchain,
            launchers,
        }
    }

    /// Link transformed IR with its `verify` launcher, run it, trust the exit code.
    ///
    /// `Err` only for a launcher that cannot be built.
    pub fn check_whole_function(
        &self,
        case_name: &str,
        transformed_ir: &Path,
        launch_code: &str,
    ) -> Result<Verdict> {
        let launcher_ir = self
            .launchers
            .request(self.toolchain, LauncherFamily::Verify, launch_code)?;
        let layout = self.toolchain.layout();
        let binary = layout.launcher_binary_path(case_name, None);

        if !self
            .toolchain
            .link_executable(&launcher_ir, transformed_ir, &binary, case_name)
        {
            return Ok(Verdict::Fail(FailReason::Link(binary)));
        }

        let run = Invocation::new(binary.display().to_string())
            .log_to(layout.log_prefix(&format!("{case_name}.run")));
        let result = self.toolchain.runner().run(&run);
        if result.success() {
            Ok(Verdict::Pass)
        } else {
            Ok(Verdict::Fail(FailReason::Launcher(result.status_text())))
        }
    }

    /// Build and run scalar and vectorized binaries and compare their output.
    pub fn check_outer_loop(
        &self,
        case_name: &str,
        scalar_ir: &Path,
        vectorized_ir: &Path,
        launch_code: &str,
    ) -> Result<Verdict> {
        let launcher_ir = self
            .launchers
            .request(self.toolchain, LauncherFamily::LoopVerify, launch_code)?;

        let scalar = self.build_and_capture(case_name, scalar_ir, &launcher_ir, Side::Scalar);
        let vectorized =
            self.build_and_capture(case_name, vectorized_ir, &launcher_ir, Side::Vectorized);
        Ok(compare_outputs(scalar.as_deref(), vectorized.as_deref()))
    }

    fn build_and_capture(
        &self,
        case_name: &str,
        code: &Path,
        launcher_ir: &Path,
        side: Side,
    ) -> Option<Vec<u8>> {
        let layout = self.toolchain.layout();
        let tag = format!("{case_name}.{}", side.variant());
        let binary = layout.launcher_binary_path(case_name, Some(side.variant()));

        if !self.toolchain.link_executable(launcher_ir, code, &binary, &tag) {
            warn!("Could not link {} binary {}", side.variant(), binary.display());
            return None;
        }

        let run = Invocation::new(binary.display().to_string())
            .log_to(layout.log_prefix(&format!("{tag}.run")));
        let result = self.toolchain.runner().run_capturing(&run);
        let captured = result.captured().map(<[u8]>::to_vec);
        debug!(
            side = side.variant(),
            digest = %digest_text(&result.stdout),
            "captured launcher output"
        );
        captured
    }
}
