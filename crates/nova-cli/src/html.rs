//! Asset references inside HTML documents.
//!
//! Finds `src` attributes of `<script>`/`<img>` and `href` attributes of `<link>`
//! using the tree-sitter HTML grammar, and rewrites them in place by byte range.

use std::ops::Range;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser};

/// One asset reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Lowercased tag name (`script`, `img`, `link`)
    pub tag: String,
    /// Attribute value as written
    pub value: String,
    /// Byte range of the value, without quotes
    pub range: Range<usize>,
}

impl AssetRef {
    /// Whether the reference points at something outside the project.
    pub fn is_external(&self) -> bool {
        let v = self.value.as_str();
        v.is_empty()
            || v.starts_with("//")
            || v.starts_with('#')
            || v.starts_with("/@")
            || v.contains("://")
            || v.starts_with("data:")
            || v.starts_with("mailto:")
    }

    /// Resolve the reference against the directory of the referencing document.
    ///
    /// Root-relative values (`/app.js`) resolve against `pages_root`.
    pub fn resolve(&self, document_dir: &Path, pages_root: &Path) -> PathBuf {
        let value = self.value.split(['?', '#']).next().unwrap_or_default();
        let joined = match value.strip_prefix('/') {
            Some(rest) => pages_root.join(rest),
            None => document_dir.join(value),
        };
        path_clean::clean(joined)
    }
}

fn attribute_for(tag: &str) -> Option<&'static str> {
    match tag {
        "script" | "img" => Some("src"),
        "link" => Some("href"),
        _ => None,
    }
}

/// Collect every asset reference in `source`, in document order.
pub fn asset_refs(source: &str) -> Vec<AssetRef> {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_html::LANGUAGE.into())
        .is_err()
    {
        return Vec::new();
    }
    let Some(tree) = parser.parse(source, None) else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "start_tag" | "self_closing_tag") {
            if let Some(r) = tag_ref(node, source) {
                refs.push(r);
            }
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    refs
}

fn tag_ref(tag: Node, source: &str) -> Option<AssetRef> {
    let bytes = source.as_bytes();
    let mut cursor = tag.walk();
    let children: Vec<Node> = tag.children(&mut cursor).collect();

    let name = children
        .iter()
        .find(|n| n.kind() == "tag_name")?
        .utf8_text(bytes)
        .ok()?
        .to_ascii_lowercase();
    let wanted = attribute_for(&name)?;

    for attr in children.iter().filter(|n| n.kind() == "attribute") {
        let mut attr_cursor = attr.walk();
        let parts: Vec<Node> = attr.children(&mut attr_cursor).collect();
        let Some(attr_name) = parts.iter().find(|n| n.kind() == "attribute_name") else {
            continue;
        };
        if !attr_name
            .utf8_text(bytes)
            .map(|n| n.eq_ignore_ascii_case(wanted))
            .unwrap_or(false)
        {
            continue;
        }

        let value_node = parts.iter().find_map(|n| match n.kind() {
            "attribute_value" => Some(*n),
            "quoted_attribute_value" => {
                let mut c = n.walk();
                let inner = n.children(&mut c).find(|v| v.kind() == "attribute_value");
                inner
            }
            _ => None,
        })?;

        return Some(AssetRef {
            tag: name,
            value: value_node.utf8_text(bytes).ok()?.to_string(),
            range: value_node.byte_range(),
        });
    }
    None
}

/// Replace reference values for which `replace` returns a new value.
pub fn rewrite_refs(source: &str, mut replace: impl FnMut(&AssetRef) -> Option<String>) -> String {
    let mut refs = asset_refs(source);
    refs.sort_by_key(|r| r.range.start);

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for r in &refs {
        if let Some(next) = replace(r) {
            out.push_str(&source[last..r.range.start]);
            out.push_str(&next);
            last = r.range.end;
        }
    }
    out.push_str(&source[last..]);
    out
}

/// Insert `snippet` right after the `<head>` start tag, or at the start when there is none.
///
/// Import maps must precede every module script, so the snippet goes first.
pub fn inject_into_head(source: &str, snippet: &str) -> String {
    match head_start_end(source) {
        Some(pos) => {
            let mut out = String::with_capacity(source.len() + snippet.len());
            out.push_str(&source[..pos]);
            out.push_str(snippet);
            out.push_str(&source[pos..]);
            out
        }
        None => format!("{}\n{}", snippet, source),
    }
}

/// Byte offset just past `<head ...>`.
fn head_start_end(source: &str) -> Option<usize> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_html::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(source, None)?;

    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.kind() == "start_tag" {
            let mut cursor = node.walk();
            let is_head = node
                .children(&mut cursor)
                .find(|n| n.kind() == "tag_name")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .is_some_and(|name| name.eq_ignore_ascii_case("head"));
            if is_head {
                return Some(node.end_byte());
            }
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}
