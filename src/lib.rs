//! `cms_migrate` - Command-line front end for `cms-migrate-lib`.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Project configuration (YAML + environment)
//! - [`fetch`] - Download of remote import archives
//! - [`logging`] - tracing subscriber setup
//!
//! Export, import and the file-backed backend live in `cms_migrate_lib`.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod fetch;
pub mod logging;

/// Run the CLI application.
///
/// This is the main entry point called from `main()`.
///
/// # Errors
///
/// Returns an error if command execution fails.
pub fn run() -> anyhow::Result<()> {
    cli::run()
}
