//! vd-harness: differential testing for an external vectorizer.
//!
//! A scalar test program is lowered to IR, transformed by the vectorizer in
//! whole-function or outer-loop mode, linked with a launcher stub and run. The
//! harness then decides whether scalar and vectorized behaviour agree.

pub mod case;
pub mod config;
pub mod driver;
pub mod error;
pub mod launcher;
pub mod naming;
pub mod process;
pub mod toolchain;
pub mod vectorizer;
pub mod verify;

pub use case::{parse_test_case, LauncherFamily, Mode, NameError, TestCase};
pub use config::HarnessConfig;
pub use driver::{discover, CaseOutcome, CaseReport, RunSummary, TestDriver};
pub use error::{HarnessError, Result};
pub use launcher::LauncherCache;
pub use naming::{base_name, ArtifactLayout};
pub use process::{CommandResult, Invocation, ProcessRunner, SystemRunner};
pub use toolchain::Toolchain;
pub use vectorizer::{VectorizeRequest, Vectorizer};
pub use verify::{compare_outputs, EquivalenceChecker, FailReason, Verdict};
