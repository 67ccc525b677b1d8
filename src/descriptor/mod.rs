//! Build descriptor handed to the build engine
//!
//! A descriptor is built by [`base::create_base`], transformed once by one of the
//! composers in [`crate::compose`], serialized to JSON and consumed by the engine.

pub mod base;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use base::create_base;

/// Complete description of one build invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    /// Entry name -> ordered module list
    pub entry: BTreeMap<String, Vec<String>>,

    pub mode: Mode,

    /// Runtime the bundle is built for
    #[serde(default)]
    pub target: Target,

    pub output: Output,

    pub module: ModuleRules,

    pub resolve: ResolveRules,

    /// Plugin directives, applied by the engine in order
    pub plugins: Vec<PluginDirective>,

    pub externals: Externals,

    /// Source map mode; `None` leaves source maps disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtool: Option<String>,
}

impl BuildDescriptor {
    /// Short label used to name the serialized descriptor on disk
    pub fn label(&self) -> &'static str {
        match (self.target, self.mode) {
            (Target::Node, _) => "server",
            (Target::Web, Mode::Development) => "development",
            (Target::Web, Mode::Production) => "production",
        }
    }

    /// Template rendering directives, in emission order
    pub fn template_directives(&self) -> impl Iterator<Item = &TemplateOptions> {
        self.plugins.iter().filter_map(|plugin| match plugin {
            PluginDirective::HtmlTemplate(options) => Some(options),
            _ => None,
        })
    }

    /// Pre-build cleanup directives
    pub fn clean_directives(&self) -> impl Iterator<Item = &CleanOptions> {
        self.plugins.iter().filter_map(|plugin| match plugin {
            PluginDirective::Clean(options) => Some(options),
            _ => None,
        })
    }

    /// Mutable access to the global-constant injector, if present
    pub fn define_mut(&mut self) -> Option<&mut BTreeMap<String, serde_json::Value>> {
        self.plugins.iter_mut().find_map(|plugin| match plugin {
            PluginDirective::Define { definitions } => Some(definitions),
            _ => None,
        })
    }
}

/// Build mode understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

/// Runtime platform of the emitted bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Web,
    Node,
}

/// Output layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    /// Directory bundles are written to
    pub path: PathBuf,

    /// Filename pattern, e.g. `[name].[chunkhash:8].js`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Public path prefix for emitted asset URLs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleRules {
    pub rules: Vec<TransformRule>,
}

/// One module transform rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRule {
    /// Regex matched against the module path
    pub test: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce: Option<Enforce>,

    /// Loader chain
    #[serde(rename = "use")]
    pub uses: Vec<Loader>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<bool>,
}

impl TransformRule {
    pub fn new(test: &str, uses: Vec<Loader>) -> Self {
        Self {
            test: test.to_string(),
            enforce: None,
            uses,
            exclude: None,
            side_effects: None,
        }
    }

    pub fn excluding(mut self, pattern: &str) -> Self {
        self.exclude = Some(pattern.to_string());
        self
    }

    pub fn side_effects(mut self, side_effects: bool) -> Self {
        self.side_effects = Some(side_effects);
        self
    }

    pub fn enforce_pre(mut self) -> Self {
        self.enforce = Some(Enforce::Pre);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforce {
    Pre,
    Post,
}

/// A loader in a rule's chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loader", content = "options")]
pub enum Loader {
    #[serde(rename = "babel-loader")]
    Babel(BabelOptions),

    #[serde(rename = "react-hot-loader/webpack")]
    HotReload,

    #[serde(rename = "mini-css-extract-plugin/loader")]
    ExtractCss,

    #[serde(rename = "css-loader")]
    Css,

    #[serde(rename = "postcss-loader")]
    PostCss(PostCssOptions),

    #[serde(rename = "sass-loader")]
    Sass,

    /// Resolves every matched module to an empty module
    #[serde(rename = "null-loader")]
    Null,

    #[serde(rename = "url-loader")]
    Url(AssetOptions),
}

/// Script transform options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BabelOptions {
    pub presets: Vec<serde_json::Value>,
    pub plugins: Vec<serde_json::Value>,
}

impl BabelOptions {
    const ENV_PRESET: &'static str = "@babel/preset-env";

    /// Point the environment preset at a browserslist query
    pub fn with_targets(mut self, query: &str) -> Self {
        let configured = serde_json::json!([Self::ENV_PRESET, { "targets": query }]);
        let position = self.presets.iter().position(|preset| match preset {
            serde_json::Value::String(name) => name == Self::ENV_PRESET,
            serde_json::Value::Array(items) => {
                items.first().and_then(|v| v.as_str()) == Some(Self::ENV_PRESET)
            }
            _ => false,
        });
        match position {
            Some(index) => self.presets[index] = configured,
            None => self.presets.insert(0, configured),
        }
        self
    }
}

impl Default for BabelOptions {
    fn default() -> Self {
        use serde_json::json;

        Self {
            presets: vec![
                json!(Self::ENV_PRESET),
                json!(["@babel/preset-react", { "runtime": "automatic" }]),
            ],
            plugins: vec![
                json!(["@babel/plugin-proposal-decorators", { "legacy": true }]),
                json!(["@babel/plugin-proposal-private-methods", { "loose": true }]),
                json!(["@babel/plugin-proposal-class-properties", { "loose": true }]),
                json!(["@babel/plugin-proposal-private-property-in-object", { "loose": true }]),
                json!("@babel/plugin-proposal-export-default-from"),
                json!("@babel/plugin-proposal-export-namespace-from"),
                json!("@babel/plugin-transform-runtime"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCssOptions {
    pub postcss_options: PostCssPlugins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCssPlugins {
    pub plugins: Vec<String>,
}

/// Asset loader options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetOptions {
    /// Inline threshold in bytes; 0 always emits a file reference
    pub limit: u64,
    pub name: String,
    pub output_path: String,
    /// Whether the binary asset is written to disk
    pub emit_file: bool,
}

impl AssetOptions {
    pub fn hashed_images(emit_file: bool) -> Self {
        Self {
            limit: 0,
            name: "[name].[hash:8].[ext]".to_string(),
            output_path: "images".to_string(),
            emit_file,
        }
    }
}

/// Module resolution rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRules {
    /// Extension search order
    pub extensions: Vec<String>,
    /// Module search directories, searched in order
    pub modules: Vec<String>,
}

/// Opaque plugin directive interpreted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum PluginDirective {
    /// Global compile-time constants
    Define {
        definitions: BTreeMap<String, serde_json::Value>,
    },
    AggressiveMerging,
    ProgressBar,
    /// Free identifiers bound to modules without an explicit import
    Provide {
        bindings: BTreeMap<String, String>,
    },
    ExtractCss {
        filename: String,
    },
    HotModuleReplacement,
    Clean(CleanOptions),
    HtmlTemplate(TemplateOptions),
    BundleAnalyzer(AnalyzerOptions),
}

impl PluginDirective {
    /// Provider exposing the UI runtime as globals
    pub fn provide_ui_runtime() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert("React".to_string(), "react".to_string());
        bindings.insert("ReactDOM".to_string(), "react-dom".to_string());
        PluginDirective::Provide { bindings }
    }

    pub fn extract_css(filename: &str) -> Self {
        PluginDirective::ExtractCss {
            filename: filename.to_string(),
        }
    }
}

/// Pre-build output cleanup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOptions {
    pub dry: bool,
    pub verbose: bool,
    /// Glob patterns relative to the output directory
    pub patterns: Vec<String>,
    /// Permit cleaning an output directory outside the project root
    pub allow_outside_project: bool,
}

/// Per-entry template rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateOptions {
    pub template: PathBuf,
    pub filename: PathBuf,
    pub chunks: Vec<String>,
    pub inject: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOptions {
    pub analyzer_mode: String,
    pub report_filename: String,
    pub open_analyzer: bool,
}

/// How a module is supplied by the consumer, per module format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTargets {
    pub amd: String,
    pub commonjs: String,
    pub commonjs2: String,
    pub root: String,
    pub var: String,
}

impl ExternalTargets {
    /// Same module id for the loaders, `global` for root/var consumers
    pub fn module(id: &str, global: &str) -> Self {
        Self {
            amd: id.to_string(),
            commonjs: id.to_string(),
            commonjs2: id.to_string(),
            root: global.to_string(),
            var: global.to_string(),
        }
    }
}

/// Dependencies the engine must not bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Externals {
    /// An explicit module table
    Modules {
        modules: BTreeMap<String, ExternalTargets>,
    },
    /// Every package installed in the host's dependency tree
    NodeModules {
        #[serde(default)]
        allowlist: Vec<String>,
    },
}
