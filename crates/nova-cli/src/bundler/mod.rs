//! Bundling of scripts and stylesheets.
//!
//! The engine sits behind [`Bundler`]. Production builds write hashed files
//! and report which output each entry point became; development builds are
//! captured in memory by a [`DevContext`], which turns every rebuild into
//! file messages for the runtime. Bare package imports stay external in
//! development and are bundled once into the vendor directory.

pub mod context;
pub mod esbuild;
pub mod metafile;
pub mod pages;

pub use esbuild::Esbuild;
pub use metafile::Metafile;
pub use pages::{development_page, import_map, production_page};

use crate::error::Result;
use crate::hmr::Message;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Entry point source path to output name (relative to the output directory).
pub type EntryMap = BTreeMap<PathBuf, String>;

/// Output name to contents.
pub type OutputFiles = BTreeMap<String, Bytes>;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub entry_points: Vec<PathBuf>,
    pub out_dir: PathBuf,
    /// Directory output names are computed relative to
    pub outbase: PathBuf,
    pub metafile: PathBuf,
    /// Add a content hash to entry names
    pub hashing: bool,
}

/// Result of one development build.
#[derive(Debug, Clone, Default)]
pub struct DevBuild {
    pub outputs: OutputFiles,
    pub entries: EntryMap,
    /// Bare imports left out of the bundle
    pub externals: BTreeSet<String>,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle to disk and return the source to output map.
    async fn build(&self, options: &BuildOptions) -> Result<EntryMap>;

    /// Bundle `entries` without touching the served output.
    async fn build_dev(&self, entries: &[PathBuf]) -> Result<DevBuild>;

    /// Bundle each of `packages` into the vendor directory.
    async fn vendor(&self, packages: &[String]) -> Result<()>;
}

/// File messages turning `prev` into `next`.
pub fn diff_outputs(prev: &OutputFiles, next: &OutputFiles) -> Vec<Message> {
    let mut messages = Vec::new();
    for (name, contents) in next {
        match prev.get(name) {
            None => messages.push(Message::create_file(name.clone(), contents.clone())),
            Some(old) if old != contents => {
                messages.push(Message::update_file(name.clone(), contents.clone()))
            }
            Some(_) => {}
        }
    }
    for name in prev.keys().filter(|n| !next.contains_key(*n)) {
        messages.push(Message::delete_file(name.clone()));
    }
    messages
}

/// Long-lived development build state.
pub struct DevContext {
    bundler: Arc<dyn Bundler>,
    entries: BTreeSet<PathBuf>,
    outputs: OutputFiles,
    entry_map: EntryMap,
    vendored: BTreeSet<String>,
}

impl DevContext {
    pub fn new(bundler: Arc<dyn Bundler>, entries: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            bundler,
            entries: entries.into_iter().collect(),
            outputs: OutputFiles::new(),
            entry_map: EntryMap::new(),
            vendored: BTreeSet::new(),
        }
    }

    pub fn add_entry(&mut self, path: PathBuf) -> bool {
        self.entries.insert(path)
    }

    pub fn remove_entry(&mut self, path: &std::path::Path) -> bool {
        self.entries.remove(path)
    }

    pub fn entries(&self) -> &BTreeSet<PathBuf> {
        &self.entries
    }

    pub fn outputs(&self) -> &OutputFiles {
        &self.outputs
    }

    pub fn entry_map(&self) -> &EntryMap {
        &self.entry_map
    }

    pub fn vendored(&self) -> &BTreeSet<String> {
        &self.vendored
    }

    pub fn import_map(&self) -> Option<String> {
        import_map(&self.vendored)
    }

    /// Rebuild and return the file messages for what changed.
    ///
    /// On failure the previous outputs stay current. Newly seen external
    /// packages are vendored; a vendoring failure is logged and retried on
    /// the next rebuild.
    pub async fn rebuild(&mut self) -> Result<Vec<Message>> {
        let entries: Vec<PathBuf> = self.entries.iter().cloned().collect();
        let build = self.bundler.build_dev(&entries).await?;

        let missing: Vec<String> = build
            .externals
            .difference(&self.vendored)
            .cloned()
            .collect();
        if !missing.is_empty() {
            match self.bundler.vendor(&missing).await {
                Ok(()) => self.vendored.extend(missing),
                Err(e) => tracing::warn!("Failed to bundle packages: {}", e),
            }
        }

        let messages = diff_outputs(&self.outputs, &build.outputs);
        self.outputs = build.outputs;
        self.entry_map = build.entries;
        Ok(messages)
    }
}
