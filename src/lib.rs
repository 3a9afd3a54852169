//! Crosshair overlay application
//!
//! Ties the persisted configuration, the command layer and the input
//! sources (control socket, termination signals) to an overlay surface from
//! `crosshair-overlay`.

pub mod app;
pub mod commands;
pub mod config_store;
pub mod control;
pub mod logging;

pub use app::App;
pub use commands::{Command, Effects};
pub use config_store::{ConfigError, ConfigStore};
