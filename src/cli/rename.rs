//! Promotion of the staged template directory

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::warn;

use crate::staging::{staged_name, PromoteOutcome, StagingManager, TEMPLATE_DIR};

/// Replace dist_ejs with the staged dist_ejs_temp
#[derive(Args, Debug)]
pub struct RenameCommand {}

impl RenameCommand {
    pub async fn execute(&self, root: &Path) -> Result<()> {
        let staging = StagingManager::new(root);
        let staged = staged_name(TEMPLATE_DIR);

        let outcome = staging
            .promote(&staged, TEMPLATE_DIR)
            .await
            .with_context(|| format!("Failed to update {}", TEMPLATE_DIR))?;

        match outcome {
            PromoteOutcome::NothingStaged => {
                eprintln!(
                    "{} Nothing staged in {}, {} left unchanged",
                    "•".dimmed(),
                    staged.cyan(),
                    TEMPLATE_DIR.cyan()
                );
            }
            PromoteOutcome::Promoted { retired, .. } => {
                if let Some(cleanup) = retired {
                    let path = cleanup.path.clone();
                    if let Err(e) = cleanup.finish().await {
                        warn!("Failed to delete {}: {}", path.display(), e);
                        eprintln!(
                            "{} Could not delete {}, remove it by hand",
                            "!".yellow().bold(),
                            path.display()
                        );
                    }
                }
                eprintln!("{} Updated {}", "✓".green().bold(), TEMPLATE_DIR.cyan());
            }
        }

        Ok(())
    }
}
