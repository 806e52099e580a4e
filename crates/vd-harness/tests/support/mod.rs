//! Scripted stand-in for the external toolchain.
//!
//! Records every invocation and imitates the side effects the harness relies
//! on: front end and vectorizer write their `-o` output, linked launchers exit
//! and print a digest.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vd_harness::config::{HarnessConfig, LayoutConfig};
use vd_harness::{CommandResult, Invocation, ProcessRunner};

#[derive(Debug, Clone)]
pub struct SimulatedTools {
    pub vectorizer_exit: i32,
    pub vectorizer_writes_output: bool,
    pub frontend_exit: i32,
    pub launcher_compile_exit: i32,
    /// Time a launcher compile takes, to hold concurrent requesters on one slot.
    pub launcher_compile_delay: Duration,
    pub link_exit: i32,
    /// Exit code of whole-function launcher binaries.
    pub launcher_exit: i32,
    pub scalar_exit: i32,
    pub scalar_digest: String,
    pub vectorized_digest: String,
}

impl Default for SimulatedTools {
    fn default() -> Self {
        Self {
            vectorizer_exit: 0,
            vectorizer_writes_output: true,
            frontend_exit: 0,
            launcher_compile_exit: 0,
            launcher_compile_delay: Duration::ZERO,
            link_exit: 0,
            launcher_exit: 0,
            scalar_exit: 0,
            scalar_digest: "9f2a\n".to_string(),
            vectorized_digest: "9f2a\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Run,
    Capture,
}

pub struct FakeRunner {
    tools: SimulatedTools,
    calls: Mutex<Vec<(CallKind, Invocation)>>,
}

impl FakeRunner {
    pub fn new(tools: SimulatedTools) -> Arc<Self> {
        Arc::new(Self {
            tools,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(CallKind, Invocation)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls().into_iter().map(|(_, inv)| inv).collect()
    }

    /// Front-end runs whose source argument contains `needle`.
    pub fn compiles_of(&self, needle: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|inv| is_frontend(inv) && inv.args.iter().any(|arg| arg.contains(needle)))
            .count()
    }

    pub fn vectorizer_calls(&self) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| inv.program.ends_with("rvTool"))
            .collect()
    }

    pub fn binary_runs(&self) -> Vec<(CallKind, Invocation)> {
        self.calls()
            .into_iter()
            .filter(|(_, inv)| inv.program.ends_with(".bin"))
            .collect()
    }

    pub fn links(&self) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| is_driver(inv) && !inv.args.iter().any(|arg| arg == "-S"))
            .collect()
    }

    fn respond(&self, invocation: &Invocation) -> CommandResult {
        let tools = &self.tools;
        if invocation.program.ends_with("rvTool") {
            if tools.vectorizer_writes_output {
                write_output(invocation, "; vectorized\n");
            }
            return CommandResult::exited(tools.vectorizer_exit);
        }

        if invocation.program.ends_with(".bin") {
            return if invocation.program.ends_with(".scalar.bin") {
                CommandResult::exited(tools.scalar_exit).with_stdout(tools.scalar_digest.clone())
            } else if invocation.program.ends_with(".loopvec.bin") {
                CommandResult::exited(0).with_stdout(tools.vectorized_digest.clone())
            } else {
                CommandResult::exited(tools.launcher_exit)
            };
        }

        if is_frontend(invocation) {
            let is_launcher = invocation
                .args
                .iter()
                .any(|arg| arg.ends_with(".cpp") && arg.contains("verify_"));
            let code = if is_launcher {
                std::thread::sleep(tools.launcher_compile_delay);
                tools.launcher_compile_exit
            } else {
                tools.frontend_exit
            };
            if code == 0 {
                write_output(invocation, "; scalar\n");
            }
            return CommandResult::exited(code);
        }

        if is_driver(invocation) {
            if tools.link_exit == 0 {
                write_output(invocation, "binary");
            }
            return CommandResult::exited(tools.link_exit);
        }

        CommandResult::launch_failed(format!("unexpected program {}", invocation.program))
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> CommandResult {
        self.calls
            .lock()
            .unwrap()
            .push((CallKind::Run, invocation.clone()));
        self.respond(invocation)
    }

    fn run_capturing(&self, invocation: &Invocation) -> CommandResult {
        self.calls
            .lock()
            .unwrap()
            .push((CallKind::Capture, invocation.clone()));
        self.respond(invocation)
    }
}

fn is_driver(invocation: &Invocation) -> bool {
    invocation.program == "clang" || invocation.program == "clang++"
}

fn is_frontend(invocation: &Invocation) -> bool {
    is_driver(invocation) && invocation.args.iter().any(|arg| arg == "-emit-llvm")
}

fn write_output(invocation: &Invocation, content: &str) {
    if let Some(path) = invocation.flag_value("-o") {
        std::fs::write(path, content).unwrap();
    }
}

/// A temporary workspace with `suite/`, `build/`, `logs/` and `launcher/`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("suite")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.layout = LayoutConfig {
            build_dir: self.root().join("build"),
            logs_dir: self.root().join("logs"),
            launcher_dir: self.root().join("launcher"),
        };
        config
    }

    pub fn add_case(&self, file_name: &str) -> PathBuf {
        let path = self.root().join("suite").join(file_name);
        std::fs::write(&path, "void foo(float *a) {}\n").unwrap();
        path
    }

    pub fn pattern(&self) -> String {
        format!("{}/suite/*.c*", self.root().display())
    }

    pub fn build_path(&self, name: &str) -> String {
        self.root().join("build").join(name).display().to_string()
    }
}
