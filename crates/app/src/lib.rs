pub mod cli;
pub mod config;
pub mod logging;
pub mod orchestrator;

pub use cli::Cli;
pub use config::{Backend, Config, ConfigError};
pub use orchestrator::{Orchestrator, RunError, RunSettings, RunStage, RunSummary};
