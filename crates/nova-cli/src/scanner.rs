//! Pages-directory scanner.
//!
//! Buckets every file under the pages root by extension and records which
//! files each handler or markup file depends on. Markup reached through such
//! a link is a template, not a page.

use crate::error::{CliError, Result};
use crate::html;
use crate::router::parser::parse_template_directives;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions handed to the bundler.
pub const SCRIPT_EXTENSIONS: [&str; 7] = ["js", "mjs", "jsx", "mjsx", "ts", "tsx", "css"];

/// Role of a file under the pages root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Go source that may define routes
    Handler,
    /// Script or stylesheet entry
    Script,
    /// HTML page or template
    Markup,
    /// Anything else, copied as is
    Asset,
}

impl FileClass {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "go" => FileClass::Handler,
            "html" => FileClass::Markup,
            e if SCRIPT_EXTENSIONS.contains(&e) => FileClass::Script,
            _ => FileClass::Asset,
        }
    }
}

/// Result of one complete scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub root: PathBuf,
    pub handlers: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
    pub markup: Vec<PathBuf>,
    pub assets: Vec<PathBuf>,
    /// Files each handler or markup file depends on
    pub links: BTreeMap<PathBuf, Vec<PathBuf>>,
    /// Markup files linked from another file
    pub templates: BTreeSet<PathBuf>,
    /// Handlers plus markup that no other file links to
    pub pages: Vec<PathBuf>,
}

impl Scan {
    /// Markup pages served as documents.
    pub fn html_pages(&self) -> impl Iterator<Item = &PathBuf> {
        self.pages
            .iter()
            .filter(|p| FileClass::of(p) == FileClass::Markup)
    }

    /// Files linking to `target`.
    pub fn dependents(&self, target: &Path) -> Vec<&PathBuf> {
        self.links
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == target))
            .map(|(file, _)| file)
            .collect()
    }
}

/// Walk `root` and classify everything in it.
///
/// Any walk or read failure aborts the scan; no partial result is returned.
pub fn scan(root: &Path) -> Result<Scan> {
    let scan_error = |message: String| CliError::Scan {
        root: root.to_path_buf(),
        message,
    };

    let mut result = Scan {
        root: root.to_path_buf(),
        ..Scan::default()
    };

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| scan_error(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        match FileClass::of(&path) {
            FileClass::Handler => result.handlers.push(path),
            FileClass::Script => result.scripts.push(path),
            FileClass::Markup => result.markup.push(path),
            FileClass::Asset => result.assets.push(path),
        }
    }

    for file in result.handlers.iter().chain(&result.markup) {
        let source = std::fs::read_to_string(file)
            .map_err(|e| scan_error(format!("{}: {}", file.display(), e)))?;
        let deps = links_of(file, &source, root);
        if !deps.is_empty() {
            result.links.insert(file.clone(), deps);
        }
    }

    result.templates = result
        .links
        .values()
        .flatten()
        .filter(|p| FileClass::of(p) == FileClass::Markup)
        .cloned()
        .collect();

    result.pages = result
        .handlers
        .iter()
        .chain(result.markup.iter().filter(|m| !result.templates.contains(*m)))
        .cloned()
        .collect();

    tracing::debug!(
        "Scanned {}: {} handlers, {} scripts, {} markup, {} assets, {} pages",
        root.display(),
        result.handlers.len(),
        result.scripts.len(),
        result.markup.len(),
        result.assets.len(),
        result.pages.len()
    );

    Ok(result)
}

/// Dependencies declared by one file. Self references are dropped.
pub fn links_of(file: &Path, source: &str, pages_root: &Path) -> Vec<PathBuf> {
    let dir = file.parent().unwrap_or(pages_root);
    let deps: Vec<PathBuf> = match FileClass::of(file) {
        FileClass::Handler => parse_template_directives(source, dir),
        FileClass::Markup => html::asset_refs(source)
            .iter()
            .filter(|r| !r.is_external())
            .map(|r| r.resolve(dir, pages_root))
            .collect(),
        _ => Vec::new(),
    };

    let mut seen = BTreeSet::new();
    deps.into_iter()
        .filter(|d| d != file && seen.insert(d.clone()))
        .collect()
}
