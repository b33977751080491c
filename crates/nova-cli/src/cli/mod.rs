//! Command-line interface definition for Nova.
//!
//! # Command Structure
//!
//! - `nova dev` - Watch the pages directory and serve it with hot reload
//! - `nova build` - Bundle, generate and compile the production server
//! - `nova init` - Write a default `nova.config.json`
//! - `nova runtime` - Built-in dev server child for `server.runtime = "native"` (hidden)

mod commands;
mod tests;

use clap::Parser;
use std::path::PathBuf;

pub use commands::{BuildArgs, Command, DevArgs, InitArgs, RuntimeArgs};

/// Nova - file-system routed Go web framework
#[derive(Parser, Debug)]
#[command(
    name = "nova",
    version,
    about = "Dev server and build tool for file-system routed Go web apps",
    long_about = "Nova turns a directory of Go handlers, HTML templates and scripts into a\n\
                  Go HTTP server. `nova dev` keeps a running server in sync with your\n\
                  sources; `nova build` produces a single self-contained binary."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file to use instead of nova.config.json
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start project discovery from this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options every project-level command needs.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            config: self.config.clone(),
            cwd: self.cwd.clone(),
        }
    }
}
