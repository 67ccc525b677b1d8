//! Error types shared across the composition and staging pipeline

use std::path::PathBuf;

use thiserror::Error;

/// The project settings file could not be turned into settings.
///
/// Always recovered: the caller falls back to the default settings.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported settings file format: {} (expected .toml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// A composer was handed settings it cannot turn into a descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("dev_server.port is required when composing a development build")]
    MissingDevServerPort,
}

/// The output directory could not be cleared before a build.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("invalid clean pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to inspect {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to clean {} outside the project root", path.display())]
    OutsideProject { path: PathBuf },

    #[error("failed to scan {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// The external build engine reported a failure.
#[derive(Debug, Error)]
pub enum BuildEngineError {
    #[error("failed to write build descriptor {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start build engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build engine command is empty")]
    EmptyCommand,

    /// Engine output, passed through verbatim.
    #[error("{0}")]
    Failed(String),
}

/// Which step of the promote sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionStep {
    Inspect,
    RetireLive,
    PromoteStaged,
}

impl std::fmt::Display for PromotionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromotionStep::Inspect => f.write_str("inspecting the directories"),
            PromotionStep::RetireLive => f.write_str("retiring the live directory"),
            PromotionStep::PromoteStaged => f.write_str("promoting the staged directory"),
        }
    }
}

/// The staged directory could not be renamed into place.
#[derive(Debug, Error)]
#[error("{step} failed ({} -> {}): {source}", from.display(), to.display())]
pub struct StagingPromotionError {
    pub step: PromotionStep,
    pub from: PathBuf,
    pub to: PathBuf,
    #[source]
    pub source: std::io::Error,
}
