//! CLI module
//!
//! Command-line interface for calling the dashboard API.
//!
//! # Commands
//!
//! - `get` / `post` / `put` / `patch` / `delete` - Call an endpoint through the client pipeline
//! - `login` - Sign in and persist the session
//! - `logout` - Sign out and clear the session
//! - `whoami` - Show the signed-in user

mod commands;
mod runner;

pub use commands::{Cli, Commands, RequestArgs, DEFAULT_STORAGE_PATH};
pub use runner::{render_error, Runner};
