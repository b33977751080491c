//! Command implementations for the Nova CLI.
//!
//! - [`dev`] - Development server with hot reload
//! - [`build`] - Production build
//! - [`init`] - Default configuration
//! - [`runtime`] - Development runtime child
//!
//! Each command provides an `execute` function taking its parsed arguments.

pub mod build;
pub mod dev;
pub mod init;
pub mod runtime;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use dev::execute as dev_execute;
pub use init::execute as init_execute;
pub use runtime::execute as runtime_execute;
