//! Configuration system for Nova with multi-source loading.
//!
//! Merges settings from defaults, `nova.config.json` and environment variables.
//! Priority: Environment > File > Defaults. The result is built once per command
//! and shared read-only afterwards.

mod defaults;
mod loading;
mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::*;

/// Name of the config file looked up at the project root.
pub const CONFIG_FILE: &str = "nova.config.json";

/// Nova configuration - loaded from nova.config.json.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NovaConfig {
    /// Where generated programs and build output go
    pub codegen: CodegenConfig,

    /// Pages directory and REST prefix
    pub router: RouterConfig,

    /// Address of the generated server
    pub server: ServerConfig,

    /// Polling intervals in milliseconds
    pub watcher: WatcherConfig,

    /// Bundling engine location
    pub bundler: BundlerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CodegenConfig {
    /// Output directory, relative to the project root
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// Pages root, relative to the project root
    #[serde(alias = "src")]
    pub pages: PathBuf,

    /// Prefix prepended to every REST route (empty for none)
    #[serde(alias = "http")]
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Maximum number of route-module processes running at once
    pub route_module_concurrency: usize,

    /// Which program `nova dev` serves from
    pub runtime: DevRuntime,
}

/// Development server implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DevRuntime {
    /// `go run` the generated `<outDir>/main.go`
    #[default]
    Generated,
    /// The same protocol served by `nova runtime`, without compiling Go
    Native,
}

/// Polling intervals, in milliseconds.
///
/// `discovery` drives the fast re-check of files already known to the watcher,
/// `sync` the full directory walk that picks up new files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct WatcherConfig {
    pub discovery: u64,
    pub sync: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BundlerConfig {
    /// esbuild executable (name on PATH or path)
    pub esbuild: String,

    /// node_modules directory, relative to the project root
    pub node_modules: PathBuf,

    /// Node.js executable hosting the incremental development build
    pub node: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pages: default_pages_dir(),
            api_base: default_api_base(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            route_module_concurrency: default_route_module_concurrency(),
            runtime: DevRuntime::default(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            discovery: default_discovery_ms(),
            sync: default_sync_ms(),
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            esbuild: default_esbuild(),
            node_modules: default_node_modules(),
            node: default_node(),
        }
    }
}

impl ServerConfig {
    /// `host:port` as handed to the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr())
    }
}

impl WatcherConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync)
    }
}

impl NovaConfig {
    /// Generate JSON Schema for nova.config.json.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(NovaConfig);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }

    /// Pretty-printed default config, as written by `nova init`.
    pub fn default_json() -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&Self::default())?)
    }
}
