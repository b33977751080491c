//! Nova CLI - dev server and build orchestrator for file-system routed Go apps.
//!
//! A Nova project is a Go module whose `src/pages` directory doubles as its
//! route table: a package's directory gives the URL path and its exported
//! handler functions give the methods. This crate turns that tree into a
//! running development server with hot reload, and into a single production
//! binary with every asset embedded.
//!
//! # Architecture
//!
//! - [`scanner`] - Classify the files under the pages root
//! - [`router`] - Parse Go handler sources into route records
//! - [`watcher`] - Poll for changes and dispatch them by file pattern
//! - [`codegen`] - Render Go entry points and route modules
//! - [`bundler`] - Drive esbuild for scripts and styles
//! - [`hmr`] - The runtime child: virtual files, dynamic routes, live updates
//! - [`runner`] - Child process lifecycle
//! - [`project`] - Project discovery, the dev session and the production pipeline
//! - [`commands`] - `dev`, `build`, `init` and the hidden `runtime`
//!
//! # Example
//!
//! ```rust,no_run
//! use nova_cli::{config::NovaConfig, error::Result, project::ProjectInfo};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let project = ProjectInfo::discover(Path::new("."))?;
//!     let config = NovaConfig::load(project.root(), None)?;
//!     println!("pages live in {}", project.abs(&config.router.pages).display());
//!     Ok(())
//! }
//! ```

pub mod bundler;
pub mod cli;
pub mod codegen;
pub mod commands;
pub mod config;
pub mod error;
pub mod hmr;
pub mod html;
pub mod logger;
pub mod project;
pub mod router;
pub mod runner;
pub mod scanner;
pub mod ui;
pub mod watcher;

// Re-export commonly used types
pub use error::{BuildError, CliError, ConfigError, Result, ResultExt};
