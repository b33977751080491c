//! The bundler's dependency metafile.

use crate::error::{Result, ResultExt};
use crate::project::to_slash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::EntryMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafile {
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, MetaOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub imports: Vec<MetaImport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaImport {
    pub path: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub external: bool,
}

/// Whether `specifier` names a package rather than a file or URL.
pub fn is_bare_specifier(specifier: &str) -> bool {
    !(specifier.is_empty()
        || specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.contains("://")
        || specifier.starts_with("data:"))
}

impl Metafile {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).with_path(path)?;
        Self::parse(&json)
    }

    /// Map each entry point source to the output it produced.
    pub fn entry_map(&self, cwd: &Path, out_dir: &Path) -> EntryMap {
        self.outputs
            .iter()
            .filter_map(|(out, meta)| {
                let entry = meta.entry_point.as_ref()?;
                let source = path_clean::clean(cwd.join(entry));
                let output = path_clean::clean(cwd.join(out));
                let name = output.strip_prefix(out_dir).ok().map(to_slash)?;
                Some((source, name))
            })
            .collect()
    }

    /// Packages imported by the outputs but left out of the bundle.
    pub fn external_packages(&self) -> BTreeSet<String> {
        self.outputs
            .values()
            .flat_map(|o| o.imports.iter())
            .filter(|i| i.external && is_bare_specifier(&i.path))
            .map(|i| i.path.clone())
            .collect()
    }
}
