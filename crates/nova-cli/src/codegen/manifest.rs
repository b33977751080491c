//! Development manifest: everything the runtime child needs to start.

use crate::config::NovaConfig;
use crate::error::{Result, ResultExt};
use crate::project::ProjectInfo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "dev.json";

/// Written by the generator, read by `nova runtime --manifest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevManifest {
    pub host: String,
    pub port: u16,
    /// Project root; route modules run from here
    pub root: PathBuf,
    /// Directory holding one route module per handler directory
    pub pages_dir: PathBuf,
    /// Vendored external packages served under `/@node_modules/`
    pub vendor_dir: PathBuf,
    pub api_base: String,
    pub route_module_concurrency: usize,
    /// Go toolchain executable
    pub go: String,
}

impl DevManifest {
    pub fn new(project: &ProjectInfo, config: &NovaConfig) -> Self {
        let out_dir = project.abs(&config.codegen.out_dir);
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            root: project.root().to_path_buf(),
            pages_dir: out_dir.join("pages"),
            vendor_dir: project.abs(&config.bundler.node_modules).join(".nova"),
            api_base: config.router.api_base.clone(),
            route_module_concurrency: config.server.route_module_concurrency,
            go: "go".to_string(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_path(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
