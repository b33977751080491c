//! Error handling for the Nova CLI.
//!
//! A hierarchical error type system using `thiserror`. Each variant is meant to be
//! actionable: it names the file or value involved and, where possible, a hint.
//!
//! # Architecture
//!
//! - **Top-level errors** (`CliError`) represent broad categories of failures
//! - **Domain-specific errors** (`ConfigError`, `BuildError`, `RuntimeError`) carry detail
//! - **Error conversion** is automatic via `#[from]` attributes
//! - **Context helpers** allow attaching additional information to errors
//!
//! # Example
//!
//! ```rust,no_run
//! use nova_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_page(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Pages live under router.pages")
//! }
//! ```

mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (invalid syntax, bad values)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generation, bundling and compilation errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Errors raised inside the HMR runtime
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Directory walk failed; the whole scan is discarded
    #[error("Scan failed in {}: {message}", .root.display())]
    Scan { root: PathBuf, message: String },

    /// A handler-source file could not be parsed
    #[error("Parse error in {}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },

    /// Child process spawn, signal or exit failures
    #[error("Process error: {0}")]
    Process(String),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Development server errors
    #[error("Server error: {0}")]
    Server(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but cannot be merged into the defaults
    #[error("Invalid config file {}: {message}\n\nHint: Check nova.config.json syntax and field types", .path.display())]
    InvalidFile { path: PathBuf, message: String },

    /// Config file already present when running `init`
    #[error("Config file already exists: {}\n\nHint: Edit it directly or remove it before running 'nova init'", .0.display())]
    AlreadyExists(PathBuf),

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Dotted path of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },

    /// I/O error while reading config
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Build pipeline errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Several independent failures, one per line
    #[error("{}", .0.join("\n"))]
    Joined(Vec<String>),

    /// Template rendering failed
    #[error("Failed to render {template}: {message}")]
    Template { template: String, message: String },

    /// The bundling engine could not be started or returned garbage
    #[error("Bundler failed: {0}\n\nHint: Install esbuild or point bundler.esbuild at its executable")]
    Bundler(String),

    /// `go build` or another compile step exited non-zero
    #[error("Command `{command}` exited with {status}")]
    CommandFailed { command: String, status: String },

    /// Generic build error
    #[error("{0}")]
    Custom(String),
}

impl BuildError {
    /// Collapse a list of errors into one, or `None` when the list is empty.
    pub fn join<E: std::fmt::Display>(errors: impl IntoIterator<Item = E>) -> Option<Self> {
        let lines: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
        if lines.is_empty() {
            None
        } else {
            Some(BuildError::Joined(lines))
        }
    }
}

/// Errors produced by the HMR runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Virtual filesystem lookup for a missing file
    #[error("{0}: not found")]
    NotFound(String),

    /// A control message could not be decoded
    #[error("Malformed control message: {0}")]
    Framing(String),

    /// The route module responded with something other than the header document
    #[error("Route module {module} returned a bad response: {message}")]
    BadResponse { module: String, message: String },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Add a file path to the error context.
    ///
    /// Turns `NotFound` I/O errors into [`CliError::FileNotFound`].
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Add a helpful hint to the error context.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error with a message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                CliError::Io(io_err) => CliError::Io(std::io::Error::new(
                    io_err.kind(),
                    format!("{}: {}", path.as_ref().display(), io_err),
                )),
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
