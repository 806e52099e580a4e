//! Test driver: discovery and the per-case state machine.
//!
//! Each case goes `parse-name → build-scalar-IR → transform → verify → report`
//! with no retries. Tool failures end the case with a failed verdict; only a
//! launcher that cannot be built ends the whole run.

use crate::case::{parse_test_case, Mode, NameError, TestCase};
use crate::config::{HarnessConfig, RunConfig};
use crate::error::{HarnessError, Result};
use crate::launcher::LauncherCache;
use crate::naming::ArtifactLayout;
use crate::process::ProcessRunner;
use crate::toolchain::Toolchain;
use crate::vectorizer::{VectorizeRequest, Vectorizer};
use crate::verify::{EquivalenceChecker, FailReason, Verdict};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Final state of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    Failed(FailReason),
    /// The file name could not be decoded; no tool was run.
    Skipped(NameError),
}

impl From<Verdict> for CaseOutcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => CaseOutcome::Passed,
            Verdict::Fail(reason) => CaseOutcome::Failed(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub path: PathBuf,
    pub mode: Option<Mode>,
    pub outcome: CaseOutcome,
    pub elapsed: Duration,
}

impl CaseReport {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Aggregate of a run, in discovery order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<CaseReport>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, report: CaseReport) {
        match report.outcome {
            CaseOutcome::Passed => self.passed += 1,
            CaseOutcome::Failed(_) => self.failed += 1,
            CaseOutcome::Skipped(_) => self.skipped += 1,
        }
        self.reports.push(report);
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    /// True when nothing failed and nothing had to be skipped.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Expand glob patterns in order; a file matched twice runs twice.
pub fn discover(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut cases = Vec::new();
    for pattern in patterns {
        let paths = glob::glob(pattern).map_err(|err| HarnessError::InvalidPattern {
            pattern: pattern.clone(),
            message: err.to_string(),
        })?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_dir() => continue,
                Ok(path) => cases.push(path),
                Err(err) => warn!("Unreadable match for '{}': {}", pattern, err),
            }
        }
    }
    Ok(cases)
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub scalar_function: String,
    pub jobs: usize,
    pub inspect: bool,
}

impl From<&RunConfig> for DriverOptions {
    fn from(run: &RunConfig) -> Self {
        Self {
            scalar_function: run.scalar_function.clone(),
            jobs: run.effective_jobs(),
            inspect: run.inspect,
        }
    }
}

/// Owns the toolchain, the vectorizer and the launcher cache for one run.
pub struct TestDriver {
    toolchain: Toolchain,
    vectorizer: Vectorizer,
    launchers: LauncherCache,
    options: DriverOptions,
}

impl TestDriver {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &HarnessConfig) -> Self {
        let layout = ArtifactLayout::from_config(&config.layout);
        Self {
            vectorizer: Vectorizer::new(Arc::clone(&runner), &config.tools.vectorizer),
            toolchain: Toolchain::new(runner, config.tools.clone(), layout),
            launchers: LauncherCache::new(),
            options: DriverOptions::from(&config.run),
        }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn launchers(&self) -> &LauncherCache {
        &self.launchers
    }

    /// Discover cases for `patterns` and run them all.
    pub fn run_patterns(
        &self,
        patterns: &[String],
        on_report: &(dyn Fn(&CaseReport) + Sync),
    ) -> Result<RunSummary> {
        self.toolchain.layout().ensure_dirs()?;
        let cases = discover(patterns)?;
        info!("Discovered {} test cases", cases.len());
        self.run_cases(&cases, on_report)
    }

    /// Run `paths`, calling `on_report` as each case finishes.
    pub fn run_cases(
        &self,
        paths: &[PathBuf],
        on_report: &(dyn Fn(&CaseReport) + Sync),
    ) -> Result<RunSummary> {
        let jobs = self.options.jobs.clamp(1, paths.len().max(1));
        if jobs == 1 {
            let mut summary = RunSummary::default();
            for path in paths {
                let report = self.run_case(path)?;
                on_report(&report);
                summary.record(report);
            }
            return Ok(summary);
        }

        debug!(jobs, "running test cases concurrently");
        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let finished: Mutex<Vec<(usize, CaseReport)>> = Mutex::new(Vec::new());
        let fatal: Mutex<Option<HarnessError>> = Mutex::new(None);

        thread::scope(|scope| {
            for _ in 0..jobs {
                scope.spawn(|| {
                    while !abort.load(Ordering::SeqCst) {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(path) = paths.get(index) else {
                            break;
                        };
                        match self.run_case(path) {
                            Ok(report) => {
                                on_report(&report);
                                finished
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .push((index, report));
                            }
                            Err(err) => {
                                abort.store(true, Ordering::SeqCst);
                                fatal
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .get_or_insert(err);
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(err);
        }

        let mut finished = finished.into_inner().unwrap_or_else(PoisonError::into_inner);
        finished.sort_by_key(|(index, _)| *index);
        let mut summary = RunSummary::default();
        for (_, report) in finished {
            summary.record(report);
        }
        Ok(summary)
    }

    /// Process one test case end to end.
    pub fn run_case(&self, path: &Path) -> Result<CaseReport> {
        let started = Instant::now();
        let (mode, outcome) = match parse_test_case(path) {
            Ok(case) => (Some(case.mode), self.execute(&case)?),
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                (None, CaseOutcome::Skipped(err))
            }
        };

        Ok(CaseReport {
            path: path.to_path_buf(),
            mode,
            outcome,
            elapsed: started.elapsed(),
        })
    }

    fn execute(&self, case: &TestCase) -> Result<CaseOutcome> {
        let scalar_ir = match self.build_scalar_ir(case) {
            Ok(path) => path,
            Err(reason) => return Ok(CaseOutcome::Failed(reason)),
        };
        let transformed_ir = match self.transform(case, &scalar_ir) {
            Ok(path) => path,
            Err(reason) => return Ok(CaseOutcome::Failed(reason)),
        };
        if self.options.inspect {
            self.inspect(case, &transformed_ir);
        }

        let name = case.name();
        let checker = EquivalenceChecker::new(&self.toolchain, &self.launchers);
        let verdict = match case.mode {
            Mode::WholeFunction => {
                checker.check_whole_function(&name, &transformed_ir, &case.launch_code)?
            }
            Mode::OuterLoop => {
                checker.check_outer_loop(&name, &scalar_ir, &transformed_ir, &case.launch_code)?
            }
        };
        Ok(verdict.into())
    }

    fn build_scalar_ir(&self, case: &TestCase) -> std::result::Result<PathBuf, FailReason> {
        let layout = self.toolchain.layout();
        let scalar_ir = layout.scalar_ir_path(&case.path);
        let log_prefix = layout.frontend_log_prefix(&case.path);
        let result = self
            .toolchain
            .compile_to_ir(&case.path, &scalar_ir, Some(&log_prefix));
        if result.success() {
            Ok(scalar_ir)
        } else {
            Err(FailReason::FrontEnd(result.status_text()))
        }
    }

    fn transform(
        &self,
        case: &TestCase,
        scalar_ir: &Path,
    ) -> std::result::Result<PathBuf, FailReason> {
        let layout = self.toolchain.layout();
        let output = layout.transformed_ir_path(&case.path, case.mode);
        let log_prefix = layout.transform_log_prefix(&case.path, case.mode);

        // A stale artifact from an earlier run must not pass the existence check.
        if let Err(err) = std::fs::remove_file(&output) {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!(error = %err, path = %output.display(), "could not remove stale artifact");
            }
        }

        let result = self.vectorizer.invoke(&VectorizeRequest {
            mode: case.mode,
            input: scalar_ir,
            output: Some(&output),
            function: Some(&self.options.scalar_function),
            mode_param: Some(&case.mode_param),
            log_prefix: Some(&log_prefix),
        });
        if !result.success() {
            return Err(FailReason::Vectorizer(result.status_text()));
        }
        if !output.exists() {
            return Err(FailReason::MissingArtifact(output));
        }
        Ok(output)
    }

    fn inspect(&self, case: &TestCase, transformed_ir: &Path) {
        let layout = self.toolchain.layout();
        let asm = layout.transformed_asm_path(&case.path, case.mode);
        let suffix = format!("{}.{}", case.name(), case.mode.artifact_suffix());
        if !self.toolchain.assemble(transformed_ir, &asm, &suffix) {
            warn!("Could not emit assembly for {}", transformed_ir.display());
        }
    }
}
