//! HTML documents served next to the bundle.

use super::EntryMap;
use crate::hmr::{HMR_CLIENT_PATH, NODE_MODULES_PREFIX};
use crate::html::{self, AssetRef};
use std::collections::BTreeSet;
use std::path::Path;

fn rewrite(
    source: &str,
    document: &Path,
    pages_root: &Path,
    entries: &EntryMap,
    prefix: &str,
) -> String {
    let dir = document.parent().unwrap_or(pages_root);
    html::rewrite_refs(source, |r: &AssetRef| {
        if r.is_external() {
            return None;
        }
        entries
            .get(&r.resolve(dir, pages_root))
            .map(|out| format!("{}{}", prefix, out))
    })
}

/// Point script and stylesheet references at the hashed build outputs.
pub fn production_page(source: &str, document: &Path, pages_root: &Path, entries: &EntryMap) -> String {
    rewrite(source, document, pages_root, entries, "/static/")
}

/// Point references at in-memory dev outputs and load the HMR client.
pub fn development_page(
    source: &str,
    document: &Path,
    pages_root: &Path,
    entries: &EntryMap,
    import_map: Option<&str>,
) -> String {
    let rewritten = rewrite(source, document, pages_root, entries, "/");
    let mut head = String::new();
    if let Some(map) = import_map {
        head.push_str(map);
        head.push('\n');
    }
    head.push_str(&format!(
        r#"<script type="module" src="{}"></script>"#,
        HMR_CLIENT_PATH
    ));
    html::inject_into_head(&rewritten, &head)
}

/// `<script type="importmap">` resolving vendored packages, if there are any.
pub fn import_map(packages: &BTreeSet<String>) -> Option<String> {
    if packages.is_empty() {
        return None;
    }
    let imports: serde_json::Map<String, serde_json::Value> = packages
        .iter()
        .map(|p| {
            let url = format!("{}{}.js", NODE_MODULES_PREFIX, p);
            (p.clone(), serde_json::Value::String(url))
        })
        .collect();
    let map = serde_json::json!({ "imports": imports });
    Some(format!(r#"<script type="importmap">{}</script>"#, map))
}
