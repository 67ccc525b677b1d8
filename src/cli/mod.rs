//! Command-line interface for Mixpack
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `init`: Project configuration scaffolding
//! - `dev`: Development build and server with hot reload
//! - `build`: Production build
//! - `ssr`: Server-render bundle
//! - `rename`: Promote the staged template directory

mod build;
mod dev;
mod init;
mod rename;
mod ssr;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::compose::Environment;
use crate::config::{load_settings, FileSettings, ProjectSettings, DEFAULT_CONFIG_PATH};
use crate::descriptor::BuildDescriptor;
use crate::engine::{BuildEngine, BuildStats};
use crate::utils::{format_duration, format_size, relative_path};

pub use build::BuildCommand;
pub use dev::DevCommand;
pub use init::{InitCommand, ProjectKind};
pub use rename::RenameCommand;
pub use ssr::SsrCommand;

/// Mixpack - development, production and SSR builds from one project configuration
#[derive(Parser, Debug)]
#[command(name = "mixpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Environment tag used by production and SSR builds
    #[arg(long, global = true, env = "NODE_ENV")]
    pub node_env: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a project configuration file
    Init(InitCommand),

    /// Build for development and start the dev server
    Dev(DevCommand),

    /// Build the project for production
    Build(BuildCommand),

    /// Build the server-render bundle
    Ssr(SsrCommand),

    /// Replace dist_ejs with the staged dist_ejs_temp
    Rename(RenameCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        let root = std::env::current_dir().context("Failed to read the working directory")?;
        let env = Environment::from_node_env(self.node_env.as_deref());

        match &self.command {
            Commands::Init(cmd) => cmd.execute(&root).await,
            Commands::Dev(cmd) => cmd.execute(&root).await,
            Commands::Build(cmd) => cmd.execute(&root, &env).await,
            Commands::Ssr(cmd) => cmd.execute(&root, &env).await,
            Commands::Rename(cmd) => cmd.execute(&root).await,
        }
    }
}

/// Location of the project settings file
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the project settings file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

impl ConfigArgs {
    /// Load settings; a broken or missing file falls back to the defaults
    pub fn load(&self, root: &Path) -> ProjectSettings {
        load_settings(&FileSettings::new(root, &self.config))
    }
}

/// Print the Mixpack banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "◆".cyan(),
        "Mixpack".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

/// Run one build with a spinner on stderr
async fn run_build(engine: &dyn BuildEngine, descriptor: &BuildDescriptor) -> Result<BuildStats> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")?);
    spinner.set_message(format!("Building {}...", descriptor.label()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = engine.run(descriptor).await;
    spinner.finish_and_clear();

    result.with_context(|| format!("{} build failed", descriptor.label()))
}

/// Print a build summary
fn print_stats(root: &Path, descriptor: &BuildDescriptor, stats: &BuildStats) {
    let time = stats
        .time
        .map(|ms| format_duration(Duration::from_millis(ms)))
        .unwrap_or_else(|| "-".to_string());

    eprintln!(
        "\n{} Built {} into {} in {}\n",
        "✓".green().bold(),
        descriptor.label(),
        relative_path(root, &descriptor.output.path).cyan(),
        time
    );

    for asset in &stats.assets {
        eprintln!(
            "  {} {} {}",
            "•".dimmed(),
            asset.name.cyan(),
            format_size(asset.size).dimmed()
        );
    }

    for warning in &stats.warnings {
        eprintln!("  {} {}", "!".yellow().bold(), warning.yellow());
    }

    if let Some(raw) = &stats.raw {
        eprintln!("{}", raw);
    }

    eprintln!();
}
