//! Process runner for external tools.
//!
//! Every external collaborator (front end, vectorizer, native toolchain and the
//! launcher binaries themselves) is reached through [`ProcessRunner`], so tests
//! can substitute a scripted runner and count invocations.

use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// A structured command line for one external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Merged on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// When set, stdout/stderr go to `<prefix>.out` / `<prefix>.err`.
    pub log_prefix: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            log_prefix: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    /// Append `flag value`, or nothing at all when the value is absent or empty.
    pub fn opt_flag(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.arg(flag).arg(value),
            _ => self,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn log_to(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.log_prefix = Some(prefix.into());
        self
    }

    /// Shell-like rendering used when echoing commands.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| quote(part))
            .join(" ")
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|arg| arg == flag)?;
        self.args.get(pos + 1).map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn quote(part: &str) -> String {
    if part.is_empty() || part.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        format!("'{}'", part.replace('\'', "'\\''"))
    } else {
        part.to_string()
    }
}

/// `<prefix>.<stream>`, e.g. `logs/foo.wfv.out`.
pub fn log_path(prefix: &Path, stream: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(".");
    path.push(stream);
    PathBuf::from(path)
}

/// Outcome of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// `None` when the process could not be launched or died from a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout, or a launch diagnostic when the launch itself failed.
    pub stdout: Vec<u8>,
    pub timed_out: bool,
    pub launch_error: Option<String>,
}

impl CommandResult {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn launch_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            exit_code: None,
            stdout: message.clone().into_bytes(),
            timed_out: false,
            launch_error: Some(message),
        }
    }

    pub fn deadline_exceeded() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Captured output of a successful run; `None` is an inconclusive capture.
    pub fn captured(&self) -> Option<&[u8]> {
        self.success().then_some(self.stdout.as_slice())
    }

    pub fn status_text(&self) -> String {
        if self.timed_out {
            "deadline exceeded".to_string()
        } else if let Some(err) = &self.launch_error {
            format!("launch failed: {err}")
        } else {
            match self.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            }
        }
    }
}

/// Executes external commands, blocking until they terminate.
///
/// Failures are values, never panics or errors: callers decide what a non-zero
/// exit means.
pub trait ProcessRunner: Send + Sync {
    /// Run with inherited or log-redirected streams.
    fn run(&self, invocation: &Invocation) -> CommandResult;

    /// Run and capture stdout for content comparison.
    fn run_capturing(&self, invocation: &Invocation) -> CommandResult;
}

/// Runner backed by real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Kill children that outlive `timeout`; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.envs(&invocation.env);
        cmd
    }

    fn spawn_and_wait(&self, invocation: &Invocation) -> io::Result<CommandResult> {
        let mut cmd = self.command(invocation);
        match &invocation.log_prefix {
            Some(prefix) => {
                cmd.stdout(Stdio::from(File::create(log_path(prefix, "out"))?));
                cmd.stderr(Stdio::from(File::create(log_path(prefix, "err"))?));
            }
            None => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
        }

        let mut child = cmd.spawn()?;
        let (exit_code, timed_out) = self.wait_for(&mut child)?;
        Ok(CommandResult {
            exit_code,
            timed_out,
            ..CommandResult::default()
        })
    }

    fn spawn_capturing(&self, invocation: &Invocation) -> io::Result<CommandResult> {
        let mut cmd = self.command(invocation);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        match &invocation.log_prefix {
            Some(prefix) => {
                cmd.stderr(Stdio::from(File::create(log_path(prefix, "err"))?));
            }
            None => {
                cmd.stderr(Stdio::inherit());
            }
        }

        let started_at = Instant::now();
        let mut child = cmd.spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        // Drain concurrently so a child filling the pipe cannot stall the deadline loop.
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = sender.send(stdout.read_to_end(&mut buf).map(|_| buf));
        });

        let (exit_code, timed_out) = self.wait_for(&mut child)?;
        let drained = match self.timeout {
            None => Some(
                receiver
                    .recv()
                    .map_err(|_| io::Error::other("stdout reader thread stopped"))?,
            ),
            // Descendants of the child may still hold the pipe open.
            Some(timeout) => {
                let remaining = timeout
                    .saturating_sub(started_at.elapsed())
                    .max(PIPE_DRAIN_GRACE);
                receiver.recv_timeout(remaining).ok()
            }
        };

        match drained {
            Some(stdout) => Ok(CommandResult {
                exit_code,
                stdout: stdout?,
                timed_out,
                launch_error: None,
            }),
            None => {
                debug!(command = %invocation, "stdout still open after deadline, abandoning reader");
                Ok(CommandResult {
                    exit_code,
                    stdout: Vec::new(),
                    timed_out: true,
                    launch_error: None,
                })
            }
        }
    }

    /// Wait for `child`, killing it on deadline expiry. A child whose wait
    /// fails is killed and reaped before the error is returned.
    fn wait_for(&self, child: &mut Child) -> io::Result<(Option<i32>, bool)> {
        let outcome = self.poll_child(child);
        reap_on_error(child, outcome)
    }

    fn poll_child(&self, child: &mut Child) -> io::Result<(Option<i32>, bool)> {
        let Some(timeout) = self.timeout else {
            let status = child.wait()?;
            return Ok((status.code(), false));
        };

        let started_at = Instant::now();
        loop {
            match child.try_wait()? {
                Some(status) => return Ok((status.code(), false)),
                None if started_at.elapsed() >= timeout => {
                    let _ = child.kill();
                    let status = child.wait()?;
                    return Ok((status.code(), true));
                }
                None => thread::sleep(self.poll_interval),
            }
        }
    }
}

fn reap_on_error<T>(child: &mut Child, outcome: io::Result<T>) -> io::Result<T> {
    if outcome.is_err() {
        let _ = child.kill();
        let _ = child.wait();
    }
    outcome
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> CommandResult {
        debug!(command = %invocation, "CMD");
        let result = self.spawn_and_wait(invocation).unwrap_or_else(|err| {
            CommandResult::launch_failed(format!("{}: {}", invocation.program, err))
        });
        echo_failure(invocation, &result);
        result
    }

    fn run_capturing(&self, invocation: &Invocation) -> CommandResult {
        debug!(command = %invocation, "CMD (capturing)");
        let result = self.spawn_capturing(invocation).unwrap_or_else(|err| {
            CommandResult::launch_failed(format!("{}: {}", invocation.program, err))
        });
        echo_failure(invocation, &result);
        result
    }
}

fn echo_failure(invocation: &Invocation, result: &CommandResult) {
    if !result.success() {
        warn!("{} ({})", invocation, result.status_text());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_exit_code_is_reported_not_raised() {
        let result = SystemRunner::new().run(&sh("exit 3"));
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
        assert!(result.captured().is_none());
    }

    #[test]
    fn test_capture_stdout() {
        let result = SystemRunner::new().run_capturing(&sh("echo 9f2a"));
        assert!(result.success());
        assert_eq!(result.captured(), Some(&b"9f2a\n"[..]));
    }

    #[test]
    fn test_log_files_are_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("case.wfv");
        let runner = SystemRunner::new();

        runner.run(&sh("echo first; echo oops >&2").log_to(&prefix));
        runner.run(&sh("echo second").log_to(&prefix));

        let out = std::fs::read_to_string(log_path(&prefix, "out")).unwrap();
        let err = std::fs::read_to_string(log_path(&prefix, "err")).unwrap();
        assert_eq!(out, "second\n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_env_override_is_merged() {
        let result = SystemRunner::new().run_capturing(
            &sh("echo \"$VD_PROBE:${PATH:+has-path}\"").env("VD_PROBE", "set"),
        );
        assert_eq!(result.captured(), Some(&b"set:has-path\n"[..]));
    }

    #[test]
    fn test_deadline_kills_child() {
        let runner = SystemRunner::new().with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let result = runner.run(&sh("sleep 5"));
        assert!(result.timed_out);
        assert!(!result.success());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_capturing_deadline_ignores_lingering_descendants() {
        let runner = SystemRunner::new().with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        // `sleep` outlives the killed shell and keeps stdout open
        let result = runner.run_capturing(&sh("sleep 3; echo late"));
        assert!(result.timed_out);
        assert!(result.captured().is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_capturing_within_deadline_keeps_output() {
        let runner = SystemRunner::new().with_timeout(Some(Duration::from_secs(5)));
        let result = runner.run_capturing(&sh("echo 9f2a"));
        assert!(!result.timed_out);
        assert_eq!(result.captured(), Some(&b"9f2a\n"[..]));
    }

    #[test]
    fn test_failed_wait_reaps_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let outcome: io::Result<()> = reap_on_error(&mut child, Err(io::Error::other("wait failed")));
        assert!(outcome.is_err());
        // already reaped, so the status is available without blocking
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_empty_option_value_is_omitted() {
        let invocation = Invocation::new("rvTool")
            .opt_flag("-k", Some(""))
            .opt_flag("-s", None)
            .opt_flag("-l", Some("outer"));
        assert_eq!(invocation.args, vec!["-l".to_string(), "outer".to_string()]);
    }

    #[test]
    fn test_missing_program_is_a_launch_failure() {
        let result = SystemRunner::new().run_capturing(&Invocation::new("/nonexistent/vd-tool"));
        assert!(!result.success());
        assert!(result.launch_error.is_some());
        // best-effort output carries the diagnostic, not program output
        assert!(!result.stdout.is_empty());
        assert!(result.captured().is_none());
    }

    #[test]
    fn test_command_line_quotes_whitespace() {
        let invocation = Invocation::new("clang").arg("-o").arg("my file.ll");
        assert_eq!(invocation.command_line(), "clang -o 'my file.ll'");
        assert_eq!(invocation.flag_value("-o"), Some("my file.ll"));
    }
}
