//! Template environment for generated Go programs.

use crate::error::BuildError;
use minijinja::{Environment, Error, ErrorKind, Value};

pub const MAIN_TEMPLATE: &str = "main.go";
pub const ROUTE_MODULE_TEMPLATE: &str = "route_module.go";
pub const DEV_MAIN_TEMPLATE: &str = "dev_main.go";

/// Browser client served by the development server.
pub const HMR_CLIENT: &str = include_str!("../../assets/hmr/hmr.js");
const RENDER_HANDLER_TEMPLATE: &str = "render_handler.go";

/// Quote a value as a Go interpreted string literal.
fn go_string(value: Value) -> Result<String, Error> {
    let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    serde_json::to_string(&text).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

/// Environment with every program template loaded.
pub fn environment() -> Result<Environment<'static>, BuildError> {
    let mut env = Environment::new();
    env.add_filter("go_string", go_string);

    for (name, source) in [
        (RENDER_HANDLER_TEMPLATE, include_str!("../../templates/render_handler.go.j2")),
        (MAIN_TEMPLATE, include_str!("../../templates/main.go.j2")),
        (ROUTE_MODULE_TEMPLATE, include_str!("../../templates/route_module.go.j2")),
        (DEV_MAIN_TEMPLATE, include_str!("../../templates/dev_main.go.j2")),
    ] {
        env.add_template(name, source).map_err(|e| template_error(name, e))?;
    }
    Ok(env)
}

pub fn template_error(name: &str, error: Error) -> BuildError {
    BuildError::Template {
        template: name.to_string(),
        message: error.to_string(),
    }
}
