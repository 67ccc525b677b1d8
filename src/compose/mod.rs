//! Configuration composition
//!
//! Every stage takes a descriptor by value and returns the next one:
//!
//! ```text
//! create_base(tag) -> prepare_base(settings) -> compose_development | compose_production
//! ```
//!
//! The server-render descriptor is composed from scratch by [`compose_server_render`],
//! borrowing only the resolve rules of a prepared `NodeSSR` base.

pub mod entry;

use std::path::Path;

use crate::config::{preset_query, ProjectSettings};
use crate::descriptor::base::{self, DEPENDENCY_TREE, IMAGE_TEST, STYLE_TEST};
use crate::descriptor::{
    AnalyzerOptions, AssetOptions, BuildDescriptor, CleanOptions, Externals, Loader,
    ModuleRules, Output, PluginDirective, ResolveRules, Target, TemplateOptions, TransformRule,
};
use crate::error::ComposeError;
use crate::paths::ToolPaths;
use crate::staging::{staged_name, SERVER_OUTPUT_DIR, TEMPLATE_DIR};

pub use entry::{EntryMap, EntryShimSet};

/// The active environment, resolved once from `NODE_ENV`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    Test,
    #[default]
    Other,
}

impl Environment {
    pub fn from_node_env(value: Option<&str>) -> Self {
        match value {
            Some("production") => Environment::Production,
            Some("test") => Environment::Test,
            _ => Environment::Other,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Skeleton for `tag` with the project's entries and customizations applied
pub fn prepare_base(tag: &str, settings: &ProjectSettings, paths: &ToolPaths) -> BuildDescriptor {
    let mut descriptor = base::create_base(tag, paths);
    descriptor.entry = entry::normalize(&settings.entry);

    let query = preset_query(&settings.preset);
    for rule in &mut descriptor.module.rules {
        for loader in &mut rule.uses {
            if let Loader::Babel(options) = loader {
                *options = options.clone().with_targets(&query);
            }
        }
    }

    let overrides = &settings.overrides;
    if let Some(extensions) = &overrides.extensions {
        descriptor.resolve.extensions = extensions.clone();
    }
    descriptor.resolve.modules.extend(overrides.modules.iter().cloned());
    if let Some(definitions) = descriptor.define_mut() {
        definitions.extend(overrides.define.clone());
    }
    if let Externals::Modules { modules } = &mut descriptor.externals {
        modules.extend(overrides.externals.clone());
    }

    settings.webpack.apply(descriptor)
}

/// Compose a development descriptor
pub fn compose_development(
    mut descriptor: BuildDescriptor,
    settings: &ProjectSettings,
    paths: &ToolPaths,
) -> Result<BuildDescriptor, ComposeError> {
    let dev_server = &settings.dev_server;
    let port = dev_server.port.ok_or(ComposeError::MissingDevServerPort)?;

    // Stable names: dev clients cache by filename across rebuilds
    descriptor.output.public_path = Some(settings.dev_path.clone());
    descriptor.output.filename = Some("[name].js".to_string());
    descriptor.plugins.push(PluginDirective::extract_css("[name].css"));

    let entries = entry::filter_entries(descriptor.entry, &settings.dev_build_only);

    let shims = if dev_server.hot {
        descriptor.module.rules.insert(
            0,
            TransformRule::new(r"\.jsx?", vec![Loader::HotReload]).excluding(DEPENDENCY_TREE),
        );
        descriptor.plugins.push(PluginDirective::HotModuleReplacement);
        EntryShimSet::hot_reload(paths, port)
    } else {
        EntryShimSet::default()
    };

    descriptor.entry = entry::prepend_shims(entries, &shims);

    let companion = paths.project_root.join(TEMPLATE_DIR);
    let templates = template_pairs(
        &descriptor.entry,
        &companion,
        paths,
        settings.favicon.as_deref(),
    );
    descriptor.plugins.extend(templates);

    descriptor.devtool = settings.source_map.clone().filter(|mode| !mode.is_empty());

    Ok(descriptor)
}

/// Compose a production descriptor
pub fn compose_production(
    mut descriptor: BuildDescriptor,
    settings: &ProjectSettings,
    paths: &ToolPaths,
    env: &Environment,
) -> BuildDescriptor {
    let libs = settings.libs;

    descriptor.output.public_path = Some(if env.is_production() {
        settings
            .inject_static_host_url
            .clone()
            .unwrap_or_else(|| settings.cdn_path.clone())
    } else {
        settings.test_path.clone()
    });
    descriptor.output.filename = Some(
        if libs {
            "[name].js"
        } else {
            "[name].[chunkhash:8].js"
        }
        .to_string(),
    );

    // The output may be a shared deploy directory outside the project
    descriptor.plugins.insert(
        0,
        PluginDirective::Clean(CleanOptions {
            dry: false,
            verbose: true,
            patterns: vec!["**/*".to_string(), "./dist".to_string()],
            allow_outside_project: true,
        }),
    );
    descriptor.plugins.push(PluginDirective::extract_css(if libs {
        "[name].css"
    } else {
        "[name][chunkhash:8].css"
    }));

    if settings.analyse.enabled {
        descriptor.plugins.push(PluginDirective::BundleAnalyzer(AnalyzerOptions {
            analyzer_mode: "static".to_string(),
            report_filename: settings.analyse.report_file.clone(),
            open_analyzer: settings.analyse.open,
        }));
    }

    if !libs {
        let staging = if settings.use_temp_path && env.is_production() {
            staged_name(TEMPLATE_DIR)
        } else {
            TEMPLATE_DIR.to_string()
        };
        let companion = paths.project_root.join(staging);
        let templates = template_pairs(
            &descriptor.entry,
            &companion,
            paths,
            settings.favicon.as_deref(),
        );
        descriptor.plugins.extend(templates);
    }

    descriptor
}

/// Compose the server-render descriptor.
///
/// `resolve` is taken from a prepared base so project overrides reach the server bundle.
pub fn compose_server_render(
    settings: &ProjectSettings,
    resolve: ResolveRules,
    paths: &ToolPaths,
    env: &Environment,
) -> BuildDescriptor {
    let mut descriptor = base::create_base("NodeSSR", paths);

    let declared = entry::normalize(&settings.node_server_entry);
    descriptor.entry = entry::filter_entries(declared, &settings.dev_build_only);
    descriptor.resolve = resolve;
    descriptor.target = Target::Node;

    let public_path = match env {
        Environment::Production => &settings.cdn_path,
        Environment::Test => &settings.test_path,
        Environment::Other => &settings.dev_path,
    };
    descriptor.output = Output {
        path: paths.project_root.join(SERVER_OUTPUT_DIR),
        filename: Some("[name].server.js".to_string()),
        public_path: Some(public_path.clone()),
        library_target: Some("commonjs2".to_string()),
    };

    descriptor.module = ModuleRules {
        rules: vec![
            base::script_rule(),
            // Server bundles never need styles
            TransformRule::new(STYLE_TEST, vec![Loader::Null]),
            // Only the resolved asset name is needed, not the file
            TransformRule::new(IMAGE_TEST, vec![Loader::Url(AssetOptions::hashed_images(false))]),
        ],
    };
    descriptor.plugins = vec![
        PluginDirective::provide_ui_runtime(),
        base::define(true, "node_ssr", false),
    ];
    descriptor.externals = Externals::NodeModules { allowlist: Vec::new() };

    descriptor
}

/// JS and CSS wrapper templates for every entry, rendered under `companion`
fn template_pairs(
    entries: &EntryMap,
    companion: &Path,
    paths: &ToolPaths,
    favicon: Option<&str>,
) -> Vec<PluginDirective> {
    entries
        .keys()
        .flat_map(|name| {
            [
                PluginDirective::HtmlTemplate(TemplateOptions {
                    template: paths.template("js.ejs"),
                    filename: companion.join(format!("{}.js.ejs", name)),
                    chunks: vec![name.clone()],
                    inject: false,
                    favicon: None,
                }),
                PluginDirective::HtmlTemplate(TemplateOptions {
                    template: paths.template("css.ejs"),
                    filename: companion.join(format!("{}.css.ejs", name)),
                    chunks: vec![name.clone()],
                    inject: false,
                    favicon: favicon.map(str::to_string),
                }),
            ]
        })
        .collect()
}
