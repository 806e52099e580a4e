//! Test-case identity: the metadata encoded in a test file name.
//!
//! Names follow `<prefix>-<mode>-<options>.<ext>` where `mode` is `wfv` or
//! `loop` and `options` is `<launchCode>_<shapeDescriptor>` (whole-function) or
//! `<launchCode>_<loopSelector>` (outer-loop).

use crate::naming::base_name;
use std::fmt;
use std::path::{Path, PathBuf};

/// Transformation mode selected by the name's mode tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Whole-function vectorization, tag `wfv`.
    WholeFunction,
    /// Outer-loop vectorization, tag `loop`.
    OuterLoop,
}

impl Mode {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "wfv" => Some(Mode::WholeFunction),
            "loop" => Some(Mode::OuterLoop),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Mode::WholeFunction => "wfv",
            Mode::OuterLoop => "loop",
        }
    }

    /// Stage suffix used in derived artifact names.
    pub fn artifact_suffix(self) -> &'static str {
        match self {
            Mode::WholeFunction => "wfv",
            Mode::OuterLoop => "loopvec",
        }
    }

    pub fn launcher_family(self) -> LauncherFamily {
        match self {
            Mode::WholeFunction => LauncherFamily::Verify,
            Mode::OuterLoop => LauncherFamily::LoopVerify,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Launcher source family, the `<familyPrefix>` in `launcher/<familyPrefix>_<code>.cpp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LauncherFamily {
    Verify,
    LoopVerify,
}

impl LauncherFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            LauncherFamily::Verify => "verify",
            LauncherFamily::LoopVerify => "loopverify",
        }
    }
}

/// A discovered test case with its decoded name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub path: PathBuf,
    /// Free-form descriptive prefix; never interpreted.
    pub prefix: String,
    pub mode: Mode,
    /// Raw option string, e.g. `chk_4xfloat`.
    pub options: String,
    pub launch_code: String,
    /// Shape descriptor (whole-function) or loop selector (outer-loop).
    pub mode_param: String,
}

impl TestCase {
    /// Base name shared by every artifact derived from this case.
    pub fn name(&self) -> String {
        base_name(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("file name '{0}' does not follow <prefix>-<mode>-<options>.<ext>")]
    MissingSegments(String),

    #[error("unrecognized mode tag '{0}'")]
    UnknownMode(String),

    #[error("option string '{options}' needs <launchCode>_<{expected}>")]
    MalformedOptions {
        options: String,
        expected: &'static str,
    },
}

/// Decode the metadata carried by a test-case file name.
pub fn parse_test_case(path: &Path) -> Result<TestCase, NameError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let parts: Vec<&str> = file_name.split('-').collect();
    if parts.len() < 2 {
        return Err(NameError::MissingSegments(file_name));
    }
    let last = parts[parts.len() - 1];
    let options = last.split('.').next().unwrap_or(last).to_string();
    let tag = parts[parts.len() - 2];
    let prefix = parts[..parts.len() - 2].join("-");

    let mode = Mode::from_tag(tag).ok_or_else(|| NameError::UnknownMode(tag.to_string()))?;

    let fields: Vec<&str> = options.split('_').collect();
    let (launch_code, mode_param) = match fields.as_slice() {
        [code, param, ..] if !code.is_empty() && !param.is_empty() => {
            (code.to_string(), param.to_string())
        }
        _ => {
            return Err(NameError::MalformedOptions {
                options,
                expected: match mode {
                    Mode::WholeFunction => "shapeDescriptor",
                    Mode::OuterLoop => "loopSelector",
                },
            })
        }
    };

    Ok(TestCase {
        path: path.to_path_buf(),
        prefix,
        mode,
        options,
        launch_code,
        mode_param,
    })
}
