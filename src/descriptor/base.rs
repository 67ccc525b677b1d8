//! Skeleton descriptor shared by every build mode

use std::collections::BTreeMap;

use serde_json::Value;

use super::{
    AssetOptions, BabelOptions, BuildDescriptor, ExternalTargets, Externals, Loader, Mode,
    ModuleRules, Output, PluginDirective, PostCssOptions, PostCssPlugins, ResolveRules, Target,
    TransformRule,
};
use crate::paths::ToolPaths;
use crate::staging::OUTPUT_DIR;
use crate::utils::slash_path;

pub const SCRIPT_TEST: &str = r"\.jsx?$";
pub const STYLE_TEST: &str = r"\.(sa|sc|c)ss$";
pub const IMAGE_TEST: &str = r"\.(png|svg|gif|jpe?g)$";
pub const DEPENDENCY_TREE: &str = "node_modules";

/// Build the skeleton descriptor for an environment tag.
///
/// `"development"` selects development mode, every other tag production mode. The
/// tag is also what the bundle sees as `__MODE__` and `process.env.NODE_ENV`.
pub fn create_base(tag: &str, paths: &ToolPaths) -> BuildDescriptor {
    let mode = if tag == "development" {
        Mode::Development
    } else {
        Mode::Production
    };

    BuildDescriptor {
        entry: BTreeMap::new(),
        mode,
        target: Target::Web,
        output: Output {
            path: paths.project_root.join(OUTPUT_DIR),
            filename: None,
            public_path: None,
            library_target: None,
        },
        module: ModuleRules {
            rules: base_rules(),
        },
        resolve: ResolveRules {
            extensions: [".js", ".jsx", ".css", ".scss"].map(String::from).to_vec(),
            modules: vec![slash_path(&paths.node_modules), DEPENDENCY_TREE.to_string()],
        },
        plugins: vec![
            define(false, tag, true),
            PluginDirective::AggressiveMerging,
            PluginDirective::ProgressBar,
            PluginDirective::provide_ui_runtime(),
        ],
        externals: ui_runtime_externals(),
        devtool: None,
    }
}

/// The babel rule every mode compiles scripts with
pub fn script_rule() -> TransformRule {
    TransformRule::new(SCRIPT_TEST, vec![Loader::Babel(BabelOptions::default())])
        .excluding(DEPENDENCY_TREE)
}

fn base_rules() -> Vec<TransformRule> {
    let styles = vec![
        Loader::ExtractCss,
        Loader::Css,
        Loader::PostCss(PostCssOptions {
            postcss_options: PostCssPlugins {
                plugins: vec!["autoprefixer".to_string()],
            },
        }),
        Loader::Sass,
    ];

    vec![
        script_rule().enforce_pre().side_effects(false),
        // Emits files rather than bindings, so it must never be tree-shaken
        TransformRule::new(STYLE_TEST, styles).side_effects(true),
        TransformRule::new(IMAGE_TEST, vec![Loader::Url(AssetOptions::hashed_images(true))]),
    ]
}

/// Global-constant injector
pub fn define(is_ssr: bool, mode: &str, mirror_node_env: bool) -> PluginDirective {
    let quoted = Value::String(format!("'{}'", mode));
    let mut definitions = BTreeMap::new();
    definitions.insert("__IS_SSR__".to_string(), Value::Bool(is_ssr));
    definitions.insert("__MODE__".to_string(), quoted.clone());
    if mirror_node_env {
        definitions.insert("process.env.NODE_ENV".to_string(), quoted);
    }
    PluginDirective::Define { definitions }
}

fn ui_runtime_externals() -> Externals {
    let mut modules = BTreeMap::new();
    modules.insert("react".to_string(), ExternalTargets::module("react", "React"));
    modules.insert("react-dom".to_string(), ExternalTargets::module("react-dom", "ReactDOM"));
    Externals::Modules { modules }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn paths() -> ToolPaths {
        ToolPaths::new(
            PathBuf::from("/work/app"),
            PathBuf::from("/opt/mixpack"),
            PathBuf::from("/opt/node_modules"),
        )
    }

    #[test]
    fn test_mode_from_tag() {
        assert_eq!(create_base("development", &paths()).mode, Mode::Development);
        assert_eq!(create_base("production", &paths()).mode, Mode::Production);
        assert_eq!(create_base("NodeSSR", &paths()).mode, Mode::Production);
        assert_eq!(create_base("Development", &paths()).mode, Mode::Production);
    }

    #[test]
    fn test_base_layout() {
        let base = create_base("development", &paths());
        assert!(base.entry.is_empty());
        assert_eq!(base.output.path, PathBuf::from("/work/app/dist"));
        assert_eq!(base.resolve.modules, vec!["/opt/node_modules", "node_modules"]);
        assert_eq!(base.resolve.extensions, vec![".js", ".jsx", ".css", ".scss"]);
    }

    #[test]
    fn test_base_rules() {
        let rules = create_base("production", &paths()).module.rules;
        assert_eq!(rules.len(), 3);

        assert_eq!(rules[0].test, SCRIPT_TEST);
        assert_eq!(rules[0].exclude.as_deref(), Some(DEPENDENCY_TREE));
        assert_eq!(rules[0].side_effects, Some(false));

        assert_eq!(rules[1].test, STYLE_TEST);
        assert_eq!(rules[1].side_effects, Some(true));
        assert_eq!(rules[1].uses.first(), Some(&Loader::ExtractCss));
        assert_eq!(rules[1].uses.last(), Some(&Loader::Sass));

        match &rules[2].uses[0] {
            Loader::Url(options) => assert!(options.emit_file),
            other => panic!("unexpected loader {:?}", other),
        }
    }

    #[test]
    fn test_base_plugins_and_externals() {
        let base = create_base("production", &paths());
        match &base.plugins[0] {
            PluginDirective::Define { definitions } => {
                assert_eq!(definitions["__IS_SSR__"], Value::Bool(false));
                assert_eq!(definitions["__MODE__"], "'production'");
                assert_eq!(definitions["process.env.NODE_ENV"], "'production'");
            }
            other => panic!("unexpected plugin {:?}", other),
        }
        assert_eq!(base.plugins[1], PluginDirective::AggressiveMerging);
        assert_eq!(base.plugins[2], PluginDirective::ProgressBar);
        assert_eq!(base.plugins[3], PluginDirective::provide_ui_runtime());

        match base.externals {
            Externals::Modules { modules } => {
                assert_eq!(modules["react"].root, "React");
                assert_eq!(modules["react-dom"].commonjs2, "react-dom");
                assert_eq!(modules["react-dom"].var, "ReactDOM");
            }
            other => panic!("unexpected externals {:?}", other),
        }
    }
}
