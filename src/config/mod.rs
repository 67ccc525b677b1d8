//! Project settings for Mixpack
//!
//! Settings come from a [`SettingsSource`] (by default the project's
//! `webpack.config.toml`) and are shallow-merged over the defaults: every top-level
//! key the project sets replaces the default value wholesale.

mod schema;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ConfigLoadError;
use crate::utils::is_filesystem_safe;

pub use schema::*;

/// Default project settings file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "./webpack.config.toml";

/// Fully merged project settings, read-only once loaded
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    /// Named target-browser baseline
    pub preset: String,

    /// Programmatic customization of the skeleton descriptor
    pub webpack: Customizer,

    /// Declarative customization of the skeleton descriptor
    pub overrides: DescriptorOverrides,

    pub dev_server: DevServerSettings,

    pub analyse: AnalyseSettings,

    /// Replaces `cdn_path` for production builds
    pub inject_static_host_url: Option<String>,

    /// Client entry points
    pub entry: BTreeMap<String, EntryValue>,

    /// Server-render entry points
    pub node_server_entry: BTreeMap<String, EntryValue>,

    /// Public path while developing
    pub dev_path: String,

    /// Public path for non-production release builds
    pub test_path: String,

    /// Public path for production release builds
    pub cdn_path: String,

    pub favicon: Option<String>,

    /// Source map mode for development builds
    pub source_map: Option<String>,

    /// Restrict development builds to these entries
    pub dev_build_only: Vec<String>,

    /// Build a reusable library instead of pages
    pub libs: bool,

    /// Stage production templates in a temporary directory
    pub use_temp_path: bool,

    pub engine: EngineSettings,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            preset: "chrome".to_string(),
            webpack: Customizer::default(),
            overrides: DescriptorOverrides::default(),
            dev_server: DevServerSettings {
                hot: true,
                port: Some(8080),
                ..DevServerSettings::default()
            },
            analyse: AnalyseSettings::default(),
            inject_static_host_url: None,
            entry: BTreeMap::new(),
            node_server_entry: BTreeMap::new(),
            dev_path: "/".to_string(),
            test_path: "/".to_string(),
            cdn_path: "/".to_string(),
            favicon: None,
            source_map: None,
            dev_build_only: Vec::new(),
            libs: false,
            use_temp_path: false,
            engine: EngineSettings::default(),
        }
    }
}

/// Settings as authored by the project; absent keys keep their defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialSettings {
    pub preset: Option<String>,
    pub webpack: Option<DescriptorOverrides>,
    pub dev_server: Option<DevServerSettings>,
    pub analyse: Option<AnalyseSettings>,
    pub inject_static_host_url: Option<String>,
    pub entry: Option<BTreeMap<String, EntryValue>>,
    pub node_server_entry: Option<BTreeMap<String, EntryValue>>,
    pub dev_path: Option<String>,
    pub test_path: Option<String>,
    pub cdn_path: Option<String>,
    pub favicon: Option<String>,
    pub source_map: Option<String>,
    pub dev_build_only: Option<Vec<String>>,
    pub libs: Option<bool>,
    pub use_temp_path: Option<bool>,
    pub engine: Option<EngineSettings>,
}

impl ProjectSettings {
    /// Shallow-merge project settings over the defaults
    pub fn merged(partial: PartialSettings) -> Self {
        let defaults = Self::default();

        Self {
            preset: partial.preset.unwrap_or(defaults.preset),
            webpack: defaults.webpack,
            overrides: partial.webpack.unwrap_or(defaults.overrides),
            dev_server: partial.dev_server.unwrap_or(defaults.dev_server),
            analyse: partial.analyse.unwrap_or(defaults.analyse),
            inject_static_host_url: partial
                .inject_static_host_url
                .or(defaults.inject_static_host_url),
            entry: partial.entry.unwrap_or(defaults.entry),
            node_server_entry: partial.node_server_entry.unwrap_or(defaults.node_server_entry),
            dev_path: partial.dev_path.unwrap_or(defaults.dev_path),
            test_path: partial.test_path.unwrap_or(defaults.test_path),
            cdn_path: partial.cdn_path.unwrap_or(defaults.cdn_path),
            favicon: partial.favicon.or(defaults.favicon),
            source_map: partial.source_map.or(defaults.source_map),
            dev_build_only: partial.dev_build_only.unwrap_or(defaults.dev_build_only),
            libs: partial.libs.unwrap_or(defaults.libs),
            use_temp_path: partial.use_temp_path.unwrap_or(defaults.use_temp_path),
            engine: partial.engine.unwrap_or(defaults.engine),
        }
    }

    /// Replace the programmatic customization step
    pub fn with_customizer(mut self, customizer: Customizer) -> Self {
        self.webpack = customizer;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let tables = [
            ("entry", &self.entry),
            ("node_server_entry", &self.node_server_entry),
        ];
        for (table, entries) in tables {
            for (name, value) in entries {
                if !is_filesystem_safe(name) {
                    return Err(ConfigLoadError::Invalid(format!(
                        "{} name '{}' is not a safe file name",
                        table, name
                    )));
                }
                if value.is_empty() {
                    return Err(ConfigLoadError::Invalid(format!(
                        "{} '{}' has no modules",
                        table, name
                    )));
                }
            }
        }

        if let Some(name) = self.dev_build_only.iter().find(|name| name.is_empty()) {
            return Err(ConfigLoadError::Invalid(format!(
                "dev_build_only contains an empty entry name: {:?}",
                name
            )));
        }

        if let Some(host) = &self.inject_static_host_url {
            url::Url::parse(host).map_err(|e| {
                ConfigLoadError::Invalid(format!("inject_static_host_url '{}': {}", host, e))
            })?;
        }

        if self.engine.command.is_empty() {
            return Err(ConfigLoadError::Invalid("engine.command must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Capability that produces project settings
pub trait SettingsSource {
    /// Human-readable origin, for diagnostics
    fn describe(&self) -> String;

    fn load(&self) -> Result<PartialSettings, ConfigLoadError>;
}

impl<F> SettingsSource for F
where
    F: Fn() -> Result<PartialSettings, ConfigLoadError>,
{
    fn describe(&self) -> String {
        "injected settings".to_string()
    }

    fn load(&self) -> Result<PartialSettings, ConfigLoadError> {
        self()
    }
}

/// Settings read from a TOML or JSON file
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// `path` is resolved against `root` when relative
    pub fn new(root: &Path, path: &Path) -> Self {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for FileSettings {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<PartialSettings, ConfigLoadError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigLoadError::Read {
            path: self.path.clone(),
            source,
        })?;

        let parse_error = |message: String| ConfigLoadError::Parse {
            path: self.path.clone(),
            message,
        };

        match self.path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
            _ => Err(ConfigLoadError::UnsupportedFormat {
                path: self.path.clone(),
            }),
        }
    }
}

/// Load, merge and validate settings, falling back to the defaults on any failure
pub fn load_settings(source: &dyn SettingsSource) -> ProjectSettings {
    let loaded = source.load().and_then(|partial| {
        let settings = ProjectSettings::merged(partial);
        settings.validate()?;
        Ok(settings)
    });

    match loaded {
        Ok(settings) => {
            debug!("Loaded settings from {}", source.describe());
            settings
        }
        Err(e) => {
            warn!("Using default settings: {}", e);
            eprintln!(
                "{} Failed to load {}, continuing with default settings",
                "!".yellow().bold(),
                source.describe().cyan()
            );
            ProjectSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> ProjectSettings {
        ProjectSettings::merged(toml::from_str(toml_src).unwrap())
    }

    #[test]
    fn test_defaults() {
        let settings = ProjectSettings::default();
        assert_eq!(settings.preset, "chrome");
        assert!(settings.dev_server.hot);
        assert_eq!(settings.dev_server.port, Some(8080));
        assert!(settings.inject_static_host_url.is_none());
        assert!(!settings.analyse.enabled);
    }

    #[test]
    fn test_shallow_merge_replaces_whole_tables() {
        let settings = parse(
            r#"
            dev_path = "http://127.0.0.1:3000/"

            [dev_server]
            port = 3000
            "#,
        );
        assert_eq!(settings.dev_path, "http://127.0.0.1:3000/");
        assert_eq!(settings.dev_server.port, Some(3000));
        // `hot` is not inherited from the default table
        assert!(!settings.dev_server.hot);
        assert_eq!(settings.preset, "chrome");
    }

    #[test]
    fn test_entry_forms() {
        let settings = parse(
            r#"
            [entry]
            main = "./src/index.js"
            admin = ["./src/polyfill.js", "./src/admin.js"]
            "#,
        );
        assert_eq!(settings.entry["main"].to_list(), vec!["./src/index.js"]);
        assert_eq!(settings.entry["admin"].to_list(), vec!["./src/polyfill.js", "./src/admin.js"]);
    }

    #[test]
    fn test_validate_rejects_unsafe_entry_names() {
        let settings = parse(
            r#"
            [entry]
            "../main" = "./src/index.js"
            "#,
        );
        assert!(matches!(settings.validate(), Err(ConfigLoadError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_static_host() {
        let settings = parse(r#"inject_static_host_url = "not a url""#);
        assert!(settings.validate().is_err());

        let settings = parse(r#"inject_static_host_url = "https://static.example.com/app/""#);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FileSettings::new(tmp.path(), Path::new("./webpack.config.toml"));
        assert!(matches!(source.load(), Err(ConfigLoadError::Read { .. })));

        let settings = load_settings(&source);
        assert_eq!(settings.dev_server.port, Some(8080));
        assert!(settings.entry.is_empty());
    }

    #[test]
    fn test_unsupported_format_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("webpack.config.js"), "module.exports = {}").unwrap();
        let source = FileSettings::new(tmp.path(), Path::new("webpack.config.js"));
        assert!(matches!(source.load(), Err(ConfigLoadError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_json_settings() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("settings.json"),
            r#"{ "libs": true, "entry": { "lib": "./src/lib.js" } }"#,
        )
        .unwrap();
        let settings = load_settings(&FileSettings::new(tmp.path(), Path::new("settings.json")));
        assert!(settings.libs);
        assert!(settings.entry.contains_key("lib"));
    }

    #[test]
    fn test_invalid_settings_fall_back() {
        let source = || -> Result<PartialSettings, ConfigLoadError> {
            Ok(PartialSettings {
                dev_build_only: Some(vec![String::new()]),
                ..PartialSettings::default()
            })
        };
        let settings = load_settings(&source);
        assert!(settings.dev_build_only.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: Result<PartialSettings, _> = toml::from_str("devserver = 1");
        assert!(result.is_err());
    }
}
