//! Causality CLI library
//!
//! Application context, configuration, local record store and command handlers behind
//! the `causality` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod store;

pub use app::{CausalityApp, Signer};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use store::{LocalStore, Model, ModelForm, Project};
