//! Development server command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use super::{run_build, ConfigArgs};
use crate::compose::{compose_development, prepare_base};
use crate::engine::ProcessEngine;
use crate::error::ComposeError;
use crate::paths::ToolPaths;
use crate::server::{DevServer, DevServerOptions};
use crate::staging::StagingManager;
use crate::utils::relative_path;

/// Build for development and start the dev server
#[derive(Args, Debug)]
pub struct DevCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DevCommand {
    pub async fn execute(&self, root: &Path) -> Result<()> {
        info!("Loading configuration from {}", self.config.config.display());
        let settings = self.config.load(root);
        let paths = ToolPaths::discover(root);

        let port = settings
            .dev_server
            .port
            .ok_or(ComposeError::MissingDevServerPort)?;
        let base = prepare_base("development", &settings, &paths);
        let descriptor = compose_development(base, &settings, &paths)?;

        let staging = StagingManager::new(root);
        let output = staging.output_dir();
        let report = staging
            .clean_output_directory()
            .await
            .with_context(|| format!("Failed to clean {}", output.display()))?;
        if report.existed {
            eprintln!(
                "{} Cleaned {}",
                "→".blue(),
                relative_path(root, &output).cyan()
            );
        }

        let engine = ProcessEngine::new(&settings.engine, root).suppress_deprecations();

        eprintln!(
            "{} Building {} entr{}...",
            "→".blue(),
            descriptor.entry.len(),
            if descriptor.entry.len() == 1 { "y" } else { "ies" }
        );
        let stats = run_build(&engine, &descriptor).await?;
        eprintln!("{} Initial build complete\n", "✓".green());

        let options = DevServerOptions::from_settings(&settings, &paths, port);
        if options.hot {
            eprintln!(
                "  {} Hot Module Replacement {}",
                "•".dimmed(),
                "enabled".green()
            );
        }
        eprintln!(
            "  {} Press {} to stop\n",
            "•".dimmed(),
            "Ctrl+C".yellow()
        );

        DevServer::new(options)
            .start(Arc::new(engine), descriptor, stats)
            .await
    }
}
