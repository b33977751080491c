//! Miette diagnostic conversion for CLI errors.

use crate::error::{BuildError, CliError};
use ::miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => build_error_to_miette(e),
        CliError::Config(e) => ::miette::miette!("Configuration error: {}", e),
        CliError::Parse { file, message } => ::miette::miette!(
            help = "Fix the syntax error; the file is skipped until then",
            "Failed to parse {}: {}",
            file.display(),
            message
        ),
        _ => ::miette::miette!("{}", err),
    }
}

/// Convert BuildError to miette Report
pub fn build_error_to_miette(err: BuildError) -> Report {
    match err {
        BuildError::Joined(lines) => {
            let count = lines.len();
            ::miette::miette!(
                "{} error{}:\n{}",
                count,
                if count == 1 { "" } else { "s" },
                lines.join("\n")
            )
        }
        BuildError::CommandFailed { command, status } => ::miette::miette!(
            help = "The command output above shows the failure",
            "`{}` exited with {}",
            command,
            status
        ),
        _ => ::miette::miette!("{}", err),
    }
}
