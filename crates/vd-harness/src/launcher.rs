//! Per-run memo of compiled launcher stubs.
//!
//! Each (family, launch code) pair is compiled at most once per cache, even
//! when several workers request it at the same moment: the first requester
//! compiles while the others block on the same slot.

use crate::case::LauncherFamily;
use crate::error::{HarnessError, Result};
use crate::toolchain::Toolchain;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LauncherKey {
    pub family: LauncherFamily,
    pub launch_code: String,
}

type Slot = Arc<OnceLock<std::result::Result<PathBuf, String>>>;

/// Launcher IR artifacts keyed by family and launch code. Never evicted.
#[derive(Debug, Default)]
pub struct LauncherCache {
    entries: DashMap<LauncherKey, Slot>,
}

impl LauncherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the compiled launcher IR, compiling it on first request.
    ///
    /// A launcher that fails to compile is an error for every later request
    /// too; it is not retried.
    pub fn request(
        &self,
        toolchain: &Toolchain,
        family: LauncherFamily,
        launch_code: &str,
    ) -> Result<PathBuf> {
        let key = LauncherKey {
            family,
            launch_code: launch_code.to_string(),
        };
        // Clone the slot out so the map shard is not locked while compiling.
        let slot = {
            let entry = self.entries.entry(key).or_default();
            Arc::clone(entry.value())
        };

        let outcome = slot.get_or_init(|| compile_launcher(toolchain, family, launch_code));
        outcome.clone().map_err(|reason| HarnessError::LauncherBuild {
            source_file: toolchain.layout().launcher_source_path(family, launch_code),
            launch_code: launch_code.to_string(),
            reason,
        })
    }

    pub fn contains(&self, family: LauncherFamily, launch_code: &str) -> bool {
        let key = LauncherKey {
            family,
            launch_code: launch_code.to_string(),
        };
        self.entries
            .get(&key)
            .is_some_and(|slot| slot.get().is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile_launcher(
    toolchain: &Toolchain,
    family: LauncherFamily,
    launch_code: &str,
) -> std::result::Result<PathBuf, String> {
    let layout = toolchain.layout();
    let source = layout.launcher_source_path(family, launch_code);
    let dest = layout.launcher_ir_path(family, launch_code);
    let log_prefix = layout.log_prefix(&format!("launcher_{}_{}", family.prefix(), launch_code));

    info!("Building launcher {}", source.display());
    let result = toolchain.compile_to_ir(&source, &dest, Some(&log_prefix));
    if result.success() {
        Ok(dest)
    } else {
        let reason = format!(
            "front end {} (see {}.err)",
            result.status_text(),
            log_prefix.display()
        );
        error!("Launcher {} is broken: {}", source.display(), reason);
        Err(reason)
    }
}
