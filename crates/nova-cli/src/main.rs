//! Nova CLI - dev server and build orchestrator for file-system routed Go apps.
//!
//! Parses arguments, sets up logging and colors, and dispatches the command.

use clap::Parser;
use nova_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let global = args.global();
    let result = match args.command {
        cli::Command::Dev(dev_args) => commands::dev_execute(dev_args, &global).await,
        cli::Command::Build(build_args) => commands::build_execute(build_args, &global).await,
        cli::Command::Init(init_args) => commands::init_execute(init_args, &global).await,
        cli::Command::Runtime(runtime_args) => commands::runtime_execute(runtime_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
