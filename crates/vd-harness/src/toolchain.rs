//! Front-end and native toolchain invocations.
//!
//! Every front-end call disables the compiler's own loop and SLP vectorizers
//! and loop unrolling, so the only vectorization observed in a test is the one
//! performed by the external vectorizer.

use crate::config::ToolConfig;
use crate::naming::ArtifactLayout;
use crate::process::{CommandResult, Invocation, ProcessRunner};
use std::path::Path;
use std::sync::Arc;

/// Source language, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// `.c` selects C; every other extension is compiled as C++.
    pub fn detect(src_file: &Path) -> Self {
        if src_file.to_string_lossy().ends_with(".c") {
            Language::C
        } else {
            Language::Cxx
        }
    }
}

/// Builds and runs compiler driver command lines.
pub struct Toolchain {
    runner: Arc<dyn ProcessRunner>,
    tools: ToolConfig,
    layout: ArtifactLayout,
}

impl Toolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>, tools: ToolConfig, layout: ArtifactLayout) -> Self {
        Self {
            runner,
            tools,
            layout,
        }
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn tools(&self) -> &ToolConfig {
        &self.tools
    }

    fn common_flags(&self) -> Vec<String> {
        vec![
            format!("-march={}", self.tools.march),
            "-m64".to_string(),
            format!("-O{}", self.tools.opt_level),
            "-fno-vectorize".to_string(),
            "-fno-slp-vectorize".to_string(),
        ]
    }

    /// The C front end with the fixed flag set.
    pub fn c_driver(&self) -> Invocation {
        Invocation::new(&self.tools.c_compiler).args(self.common_flags())
    }

    /// The C++ front end with the fixed flag set; also the link driver.
    pub fn cxx_driver(&self) -> Invocation {
        Invocation::new(&self.tools.cxx_compiler)
            .arg(format!("-std={}", self.tools.cxx_standard))
            .args(self.common_flags())
    }

    pub fn compile_to_ir_invocation(&self, src_file: &Path, dest_file: &Path) -> Invocation {
        let driver = match Language::detect(src_file) {
            Language::C => self.c_driver(),
            Language::Cxx => self.cxx_driver(),
        };
        driver
            .path_arg(src_file)
            .args(["-fno-unroll-loops", "-S", "-emit-llvm", "-c", "-o"])
            .path_arg(dest_file)
    }

    /// Lower one source file to textual IR.
    pub fn compile_to_ir(
        &self,
        src_file: &Path,
        dest_file: &Path,
        log_prefix: Option<&Path>,
    ) -> CommandResult {
        let mut invocation = self.compile_to_ir_invocation(src_file, dest_file);
        if let Some(prefix) = log_prefix {
            invocation = invocation.log_to(prefix);
        }
        self.runner.run(&invocation)
    }

    pub fn link_invocation(&self, launcher_ir: &Path, code: &Path, dest_binary: &Path) -> Invocation {
        self.cxx_driver()
            .arg("-o")
            .path_arg(dest_binary)
            .path_arg(launcher_ir)
            .path_arg(code)
    }

    /// Link a launcher with transformed (or scalar) code into one executable.
    ///
    /// Diagnostics go to `logs/clang-launcher_<log_suffix>`.
    pub fn link_executable(
        &self,
        launcher_ir: &Path,
        code: &Path,
        dest_binary: &Path,
        log_suffix: &str,
    ) -> bool {
        let invocation = self
            .link_invocation(launcher_ir, code, dest_binary)
            .log_to(self.layout.log_prefix(&format!("clang-launcher_{log_suffix}")));
        self.runner.run(&invocation).success()
    }

    /// Emit native assembly for inspection.
    pub fn assemble(&self, code: &Path, dest_asm: &Path, log_suffix: &str) -> bool {
        let invocation = self
            .cxx_driver()
            .args(["-c", "-S", "-o"])
            .path_arg(dest_asm)
            .path_arg(code)
            .log_to(self.layout.log_prefix(&format!("clang-asm_{log_suffix}")));
        self.runner.run(&invocation).success()
    }

    /// Turn a bitcode file into readable IR next to it.
    pub fn disassemble(&self, path: &Path, log_suffix: &str) -> bool {
        let invocation = Invocation::new(&self.tools.disassembler)
            .path_arg(path)
            .log_to(self.layout.log_prefix(&format!("dis_{log_suffix}")));
        self.runner.run(&invocation).success()
    }

    /// Run the C++ front end with the vectorizer loaded as a compiler plugin.
    pub fn compile_with_plugin<I, S>(&self, args: I, log_prefix: Option<&Path>) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut invocation = self
            .cxx_driver()
            .args(["-Xclang", "-load", "-Xclang"])
            .path_arg(&self.tools.plugin)
            .arg("-O3")
            .args(args);
        if let Some(prefix) = log_prefix {
            invocation = invocation.log_to(prefix);
        }
        self.runner.run(&invocation)
    }
}
