//! Locating the shared dependency directory and the tool's own assets
//!
//! The hot-reload shims live in whichever `node_modules` directory holds
//! `webpack-dev-server/client`. That directory may sit next to the tool, several
//! levels above it when the tool is itself installed as a nested dependency, or in
//! the project being built.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::slash_path;

/// Environment variable overriding the tool installation root
pub const HOME_ENV: &str = "MIXPACK_HOME";

/// File whose presence marks the shared dependency directory
const PROBE: &[&str] = &["webpack-dev-server", "client", "index.js"];

/// Resolved locations for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Project being built (the working directory)
    pub project_root: PathBuf,

    /// Installation root of this tool
    pub tool_root: PathBuf,

    /// Shared dependency directory the shims are resolved from
    pub node_modules: PathBuf,
}

impl ToolPaths {
    pub fn new(project_root: PathBuf, tool_root: PathBuf, node_modules: PathBuf) -> Self {
        Self {
            project_root,
            tool_root,
            node_modules,
        }
    }

    /// Discover the tool root and shared dependency directory for `project_root`
    pub fn discover(project_root: &Path) -> Self {
        let tool_root = tool_root();
        let node_modules = resolve_node_modules(&tool_root, project_root);
        debug!(
            "Shared dependency directory: {} (tool root {})",
            node_modules.display(),
            tool_root.display()
        );
        Self::new(project_root.to_path_buf(), tool_root, node_modules)
    }

    /// A module path inside the shared dependency directory, `/`-separated
    pub fn shared_module(&self, relative: &str) -> String {
        slash_path(&self.node_modules.join(relative))
    }

    /// A template shipped with the tool
    pub fn template(&self, name: &str) -> PathBuf {
        self.tool_root.join("template").join(name)
    }

    /// Dependency directories exposed as static roots by the dev server
    pub fn static_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.tool_root.join("node_modules")];
        if let Some(outer) = self.tool_root.ancestors().nth(3) {
            dirs.push(outer.join("node_modules"));
        }
        if !dirs.contains(&self.node_modules) {
            dirs.push(self.node_modules.clone());
        }
        dirs.into_iter().filter(|dir| dir.is_dir()).collect()
    }
}

/// Installation root: `$MIXPACK_HOME`, else two levels above the executable
/// (`<root>/bin/mixpack`)
fn tool_root() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.ancestors().nth(2).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

/// Find the `node_modules` directory holding the dev transport client.
///
/// Searches upwards from the tool root first, then from the project root. Falls
/// back to the directory containing the tool, which is where a nested install
/// places its siblings.
pub fn resolve_node_modules(tool_root: &Path, project_root: &Path) -> PathBuf {
    for start in [tool_root, project_root] {
        for dir in start.ancestors() {
            let candidate = dir.join("node_modules");
            let probe = PROBE.iter().fold(candidate.clone(), |path, part| path.join(part));
            if probe.is_file() {
                return candidate;
            }
        }
    }

    tool_root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| tool_root.to_path_buf())
}
