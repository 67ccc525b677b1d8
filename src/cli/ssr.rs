//! Server-render build command

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::{info, warn};

use super::{print_stats, run_build, ConfigArgs};
use crate::compose::{compose_server_render, prepare_base, Environment};
use crate::engine::ProcessEngine;
use crate::paths::ToolPaths;

/// Build the server-render bundle
#[derive(Args, Debug)]
pub struct SsrCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl SsrCommand {
    pub async fn execute(&self, root: &Path, env: &Environment) -> Result<()> {
        info!("Loading configuration from {}", self.config.config.display());
        let settings = self.config.load(root);
        let paths = ToolPaths::discover(root);

        let resolve = prepare_base("NodeSSR", &settings, &paths).resolve;
        let descriptor = compose_server_render(&settings, resolve, &paths, env);

        if descriptor.entry.is_empty() {
            warn!("No node_server_entry declared, the server bundle is empty");
        }

        eprintln!("{} Building server bundle...", "→".blue());

        let engine = ProcessEngine::new(&settings.engine, root);
        let stats = run_build(&engine, &descriptor).await?;
        print_stats(root, &descriptor, &stats);

        Ok(())
    }
}
