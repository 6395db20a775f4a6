//! Process wiring
//!
//! - [`Config`] - environment configuration
//! - [`EngineState`] - opened stores, workers and services
//! - [`BackgroundTasks`] - long-running task registry

pub mod config;
pub mod state;
pub mod tasks;

pub use config::{Config, ConfigError};
pub use state::EngineState;
pub use tasks::{BackgroundTasks, TaskKind};
