use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available Nova subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Scans the pages directory, starts the dev server and keeps it in sync
    /// with handler, template and script changes until interrupted.
    Dev(DevArgs),

    /// Build the production server
    ///
    /// Bundles scripts with hashed names, generates main.go embedding the
    /// pages, templates and bundle, and compiles it with `go build`.
    Build(BuildArgs),

    /// Write a default nova.config.json
    Init(InitArgs),

    /// Run the development runtime (started by `nova dev`)
    #[command(hide = true)]
    Runtime(RuntimeArgs),
}

/// Arguments for the dev command
#[derive(Args, Debug, Default)]
pub struct DevArgs {
    /// Override server.host
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Override server.port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,
}

/// Arguments for the build command
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Stop after generating main.go
    #[arg(long)]
    pub no_compile: bool,
}

/// Arguments for the init command
#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Also write the JSON schema next to the config
    #[arg(long)]
    pub schema: bool,
}

/// Arguments for the runtime command
#[derive(Args, Debug)]
pub struct RuntimeArgs {
    /// Development manifest written by `nova dev`
    #[arg(long, value_name = "FILE")]
    pub manifest: PathBuf,
}
