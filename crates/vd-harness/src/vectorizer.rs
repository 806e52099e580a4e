//! Dispatch to the external vectorizer tool.
//!
//! Contract: `<tool> (-wfv | -loopvec) -i <input> [-o <output>] [-k <function>]
//! [-s <shapes> | -l <loop selector>]`. Only the exit status and the existence
//! of the output artifact matter to callers; the tool's own diagnostics end up
//! in the per-case log files untouched.

use crate::case::Mode;
use crate::process::{CommandResult, Invocation, ProcessRunner};
use std::path::Path;
use std::sync::Arc;

fn mode_flag(mode: Mode) -> &'static str {
    match mode {
        Mode::WholeFunction => "-wfv",
        Mode::OuterLoop => "-loopvec",
    }
}

fn param_flag(mode: Mode) -> &'static str {
    match mode {
        Mode::WholeFunction => "-s",
        Mode::OuterLoop => "-l",
    }
}

/// One vectorizer run. Absent optional values omit their flag entirely.
#[derive(Debug, Clone, Copy)]
pub struct VectorizeRequest<'a> {
    pub mode: Mode,
    pub input: &'a Path,
    pub output: Option<&'a Path>,
    pub function: Option<&'a str>,
    /// Shape descriptor (whole-function) or loop selector (outer-loop).
    pub mode_param: Option<&'a str>,
    pub log_prefix: Option<&'a Path>,
}

pub struct Vectorizer {
    runner: Arc<dyn ProcessRunner>,
    program: String,
}

impl Vectorizer {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn invocation(&self, request: &VectorizeRequest<'_>) -> Invocation {
        let output = request.output.map(|path| path.display().to_string());
        let mut invocation = Invocation::new(&self.program)
            .arg(mode_flag(request.mode))
            .arg("-i")
            .path_arg(request.input)
            .opt_flag("-o", output.as_deref())
            .opt_flag("-k", request.function)
            .opt_flag(param_flag(request.mode), request.mode_param);
        if let Some(prefix) = request.log_prefix {
            invocation = invocation.log_to(prefix);
        }
        invocation
    }

    pub fn invoke(&self, request: &VectorizeRequest<'_>) -> CommandResult {
        self.runner.run(&self.invocation(request))
    }
}
