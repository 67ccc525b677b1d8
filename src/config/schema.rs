//! Configuration schema definitions

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::{BuildDescriptor, ExternalTargets};

/// An entry declaration: one module or an ordered list of modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryValue {
    Single(String),
    List(Vec<String>),
}

impl EntryValue {
    /// List form of the declaration
    pub fn to_list(&self) -> Vec<String> {
        match self {
            EntryValue::Single(path) => vec![path.clone()],
            EntryValue::List(paths) => paths.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EntryValue::Single(path) => path.is_empty(),
            EntryValue::List(paths) => paths.is_empty(),
        }
    }
}

/// Development server configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DevServerSettings {
    /// Enable hot module replacement
    #[serde(default)]
    pub hot: bool,

    /// Port to run dev server on; required for development builds
    #[serde(default)]
    pub port: Option<u16>,

    /// Host to bind to
    #[serde(default)]
    pub host: Option<String>,

    /// Extra static directories mounted on the dev server
    #[serde(default)]
    pub mounts: Vec<StaticMount>,

    /// Runs before the built-in routes are installed
    #[serde(skip)]
    pub before: Option<RouterHook>,
}

impl fmt::Debug for DevServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevServerSettings")
            .field("hot", &self.hot)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("mounts", &self.mounts)
            .field("before", &self.before.is_some())
            .finish()
    }
}

/// Router customization applied ahead of the dev server's own routes
pub type RouterHook = Arc<dyn Fn(axum::Router) -> axum::Router + Send + Sync>;

/// A directory served under a URL prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticMount {
    /// URL prefix, e.g. `/mock`
    pub route: String,

    /// Directory, relative to the project root
    pub dir: String,
}

/// Bundle analysis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyseSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_report_file")]
    pub report_file: String,

    /// Open the report once written
    #[serde(default)]
    pub open: bool,
}

impl Default for AnalyseSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            report_file: default_report_file(),
            open: false,
        }
    }
}

fn default_report_file() -> String {
    "report.html".to_string()
}

/// Declarative descriptor customization (the `[webpack]` table)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorOverrides {
    /// Replaces the extension search order
    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    /// Extra module directories, searched after the defaults
    #[serde(default)]
    pub modules: Vec<String>,

    /// Extra compile-time constants
    #[serde(default)]
    pub define: BTreeMap<String, serde_json::Value>,

    /// Extra externally supplied modules
    #[serde(default)]
    pub externals: BTreeMap<String, ExternalTargets>,
}

/// Build engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Program and leading arguments; the descriptor path is appended
    #[serde(default = "default_engine_command")]
    pub command: Vec<String>,

    /// Directory serialized descriptors are written to
    #[serde(default = "default_descriptor_dir")]
    pub descriptor_dir: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            descriptor_dir: default_descriptor_dir(),
        }
    }
}

fn default_engine_command() -> Vec<String> {
    ["npx", "--no-install", "mixpack-engine"].map(String::from).to_vec()
}

fn default_descriptor_dir() -> String {
    ".mixpack".to_string()
}

/// Programmatic customization of the skeleton descriptor
#[derive(Clone)]
pub struct Customizer(Arc<dyn Fn(BuildDescriptor) -> BuildDescriptor + Send + Sync>);

impl Customizer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(BuildDescriptor) -> BuildDescriptor + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, descriptor: BuildDescriptor) -> BuildDescriptor {
        (self.0)(descriptor)
    }
}

impl Default for Customizer {
    fn default() -> Self {
        Self::new(|descriptor| descriptor)
    }
}

impl fmt::Debug for Customizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Customizer(..)")
    }
}

/// Browserslist query for a named preset
pub fn preset_query(preset: &str) -> String {
    match preset {
        "chrome" => "last 2 Chrome versions".to_string(),
        "modern" => "supports es6-module".to_string(),
        "legacy" => "> 0.5%, last 2 versions, not dead".to_string(),
        other => other.to_string(),
    }
}
