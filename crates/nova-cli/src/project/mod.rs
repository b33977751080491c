//! The project being developed: where it lives and what runs on it.

mod build;
mod info;
mod session;

pub use build::{BuildSummary, EMBEDDED_DIRS, compile, prepare};
pub use info::{ProjectInfo, parse_module_name, to_slash};
pub use session::{DevSession, HANDLER_KEY, MARKUP_KEY, route_messages, route_targets, script_key};
