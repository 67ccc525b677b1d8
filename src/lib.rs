//! Mixpack library
//!
//! Composes build descriptors for development, production and server-render builds
//! from one project configuration, and stages their output.

pub mod cli;
pub mod compose;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod paths;
pub mod server;
pub mod staging;
pub mod utils;

pub use cli::Cli;
pub use config::{ProjectSettings, SettingsSource};
pub use descriptor::BuildDescriptor;
pub use engine::BuildEngine;
