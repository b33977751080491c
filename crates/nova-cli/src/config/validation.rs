use crate::config::NovaConfig;
use crate::error::{ConfigError, Result};

fn invalid(field: &str, value: impl ToString, hint: &str) -> crate::CliError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        hint: hint.to_string(),
    }
    .into()
}

impl NovaConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.codegen.out_dir.as_os_str().is_empty() {
            return Err(invalid("codegen.outDir", "\"\"", "Use a directory such as .nova"));
        }

        if self.router.pages.as_os_str().is_empty() {
            return Err(invalid("router.pages", "\"\"", "Use a directory such as src/pages"));
        }

        if self.codegen.out_dir == self.router.pages {
            return Err(invalid(
                "codegen.outDir",
                self.codegen.out_dir.display(),
                "The output directory cannot be the pages directory",
            ));
        }

        let base = &self.router.api_base;
        if !base.is_empty() && !base.starts_with('/') {
            return Err(invalid("router.apiBase", base, "Must be empty or start with '/'"));
        }
        if base.contains(' ') || base.contains('{') {
            return Err(invalid("router.apiBase", base, "Must be a plain path prefix"));
        }

        if self.server.host.is_empty() {
            return Err(invalid("server.host", "\"\"", "Use localhost or an IP address"));
        }

        if self.server.port == 0 {
            return Err(invalid("server.port", 0, "Use a port between 1 and 65535"));
        }

        if self.server.route_module_concurrency == 0 {
            return Err(invalid(
                "server.routeModuleConcurrency",
                0,
                "At least one route module must be allowed to run",
            ));
        }

        if self.watcher.discovery == 0 {
            return Err(invalid("watcher.discovery", 0, "Polling intervals are in milliseconds and must be positive"));
        }

        if self.watcher.sync == 0 {
            return Err(invalid("watcher.sync", 0, "Polling intervals are in milliseconds and must be positive"));
        }

        if self.bundler.esbuild.trim().is_empty() {
            return Err(invalid("bundler.esbuild", "\"\"", "Name or path of the esbuild executable"));
        }

        if self.bundler.node.trim().is_empty() {
            return Err(invalid("bundler.node", "\"\"", "Name or path of the node executable"));
        }

        Ok(())
    }
}
