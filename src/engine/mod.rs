//! Build engine boundary
//!
//! The engine is opaque: it receives a finished [`BuildDescriptor`] and answers with
//! stats or an error. [`ProcessEngine`] runs an external command that reads the
//! serialized descriptor from disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::descriptor::BuildDescriptor;
use crate::error::BuildEngineError;

/// Result reported by a successful build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    #[serde(default)]
    pub hash: Option<String>,

    /// Build time in milliseconds
    #[serde(default)]
    pub time: Option<u64>,

    #[serde(default)]
    pub assets: Vec<AssetStat>,

    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(default)]
    pub errors: Vec<String>,

    /// Engine output that was not structured stats
    #[serde(skip)]
    pub raw: Option<String>,
}

impl BuildStats {
    /// Interpret engine stdout: structured stats when it is JSON, raw text otherwise
    pub fn from_output(stdout: &str) -> Self {
        match serde_json::from_str::<BuildStats>(stdout.trim()) {
            Ok(stats) => stats,
            Err(_) => BuildStats {
                raw: Some(stdout.trim().to_string()).filter(|s| !s.is_empty()),
                ..BuildStats::default()
            },
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStat {
    pub name: String,
    pub size: u64,
}

/// Runs one build for a descriptor
#[async_trait]
pub trait BuildEngine: Send + Sync {
    async fn run(&self, descriptor: &BuildDescriptor) -> Result<BuildStats, BuildEngineError>;
}

/// Engine backed by an external command
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: Vec<String>,
    root: PathBuf,
    descriptor_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl ProcessEngine {
    pub fn new(settings: &EngineSettings, root: &Path) -> Self {
        Self {
            command: settings.command.clone(),
            root: root.to_path_buf(),
            descriptor_dir: root.join(&settings.descriptor_dir),
            env: Vec::new(),
        }
    }

    /// Silence deprecation warnings of the engine process
    pub fn suppress_deprecations(mut self) -> Self {
        self.env.push(("NODE_OPTIONS".to_string(), "--no-deprecation".to_string()));
        self
    }

    /// Where the descriptor for `descriptor` is written
    pub fn descriptor_path(&self, descriptor: &BuildDescriptor) -> PathBuf {
        self.descriptor_dir
            .join(format!("{}.descriptor.json", descriptor.label()))
    }

    async fn write_descriptor(
        &self,
        descriptor: &BuildDescriptor,
    ) -> Result<PathBuf, BuildEngineError> {
        let path = self.descriptor_path(descriptor);
        let json = serde_json::to_string_pretty(descriptor)
            .map_err(|e| BuildEngineError::Descriptor {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;

        let io_error = |source| BuildEngineError::Descriptor {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.descriptor_dir)
            .await
            .map_err(io_error)?;
        tokio::fs::write(&path, json).await.map_err(io_error)?;

        Ok(path)
    }
}

#[async_trait]
impl BuildEngine for ProcessEngine {
    async fn run(&self, descriptor: &BuildDescriptor) -> Result<BuildStats, BuildEngineError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(BuildEngineError::EmptyCommand)?;

        let descriptor_path = self.write_descriptor(descriptor).await?;
        debug!("Descriptor written to {}", descriptor_path.display());

        let start = Instant::now();
        let output = Command::new(program)
            .args(args)
            .arg(&descriptor_path)
            .current_dir(&self.root)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|source| BuildEngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let message = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
            return Err(BuildEngineError::Failed(format!(
                "{} ({})",
                message, output.status
            )));
        }

        let mut stats = BuildStats::from_output(&stdout);
        if stats.has_errors() {
            return Err(BuildEngineError::Failed(stats.errors.join("\n")));
        }
        if stats.time.is_none() {
            stats.time = Some(start.elapsed().as_millis() as u64);
        }

        info!("{} build finished", descriptor.label());
        Ok(stats)
    }
}
