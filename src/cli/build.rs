//! Build command implementation

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use super::{print_stats, run_build, ConfigArgs};
use crate::compose::{compose_production, prepare_base, Environment};
use crate::engine::ProcessEngine;
use crate::paths::ToolPaths;
use crate::staging::{staged_name, StagingManager, TEMPLATE_DIR};
use crate::utils::relative_path;

/// Build the project for production
#[derive(Args, Debug)]
pub struct BuildCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl BuildCommand {
    pub async fn execute(&self, root: &Path, env: &Environment) -> Result<()> {
        info!("Loading configuration from {}", self.config.config.display());
        let settings = self.config.load(root);
        let paths = ToolPaths::discover(root);

        let base = prepare_base("production", &settings, &paths);
        let descriptor = compose_production(base, &settings, &paths, env);

        let staging = StagingManager::new(root);
        for options in descriptor.clean_directives() {
            let report = staging
                .clean(&descriptor.output.path, options)
                .await
                .with_context(|| format!("Failed to clean {}", descriptor.output.path.display()))?;
            if report.existed {
                eprintln!(
                    "{} Cleaned {} ({} entries)",
                    "→".blue(),
                    relative_path(root, &descriptor.output.path).cyan(),
                    report.removed.len()
                );
            }
        }

        eprintln!("{} Building for production...", "→".blue());

        let engine = ProcessEngine::new(&settings.engine, root);
        let stats = run_build(&engine, &descriptor).await?;
        print_stats(root, &descriptor, &stats);

        let staged = root.join(staged_name(TEMPLATE_DIR));
        let templates_staged = descriptor
            .template_directives()
            .any(|template| template.filename.starts_with(&staged));
        if templates_staged {
            eprintln!(
                "  {} Templates staged in {}; run {} to publish them\n",
                "•".dimmed(),
                staged_name(TEMPLATE_DIR).cyan(),
                "mixpack rename".yellow()
            );
        }

        Ok(())
    }
}
