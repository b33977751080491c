//! Static analysis of Go handler files.
//!
//! Only the syntax tree is inspected: top-level function declarations for
//! handler names and `//nova:template` line comments for template files.

use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// Prefix of the directive comment naming template files.
pub const TEMPLATE_DIRECTIVE: &str = "//nova:template";

/// HTTP verbs recognized as REST handler names.
pub const HTTP_METHODS: [&str; 9] = [
    "CONNECT", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "TRACE",
];

/// What a handler-source file declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoSource {
    /// Exported function names that define routes, in declaration order
    pub handlers: Vec<String>,
    /// Template files named by directives, resolved against the file's directory
    pub templates: Vec<PathBuf>,
}

/// Handler role derived from a function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerName<'a> {
    Render,
    Verb(&'a str),
}

/// Classify an exported function name.
pub fn classify_handler(name: &str) -> Option<HandlerName<'static>> {
    if !name.chars().next().is_some_and(char::is_uppercase) {
        return None;
    }
    let upper = name.to_ascii_uppercase();
    if upper == "RENDER" {
        return Some(HandlerName::Render);
    }
    HTTP_METHODS
        .iter()
        .find(|m| **m == upper)
        .map(|m| HandlerName::Verb(m))
}

fn parse_tree(source: &str) -> Result<Tree, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| e.to_string())?;
    parser
        .parse(source, None)
        .ok_or_else(|| "parser returned no tree".to_string())
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Parse Go source text. `dir` is the directory of the file, used to resolve
/// template directives.
///
/// Fails on syntax errors with a `line:column: message` description.
pub fn parse_source(source: &str, dir: &Path) -> Result<GoSource, String> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();

    if let Some(err) = first_error(root) {
        let pos = err.start_position();
        let what = if err.is_missing() {
            format!("missing {}", err.kind())
        } else {
            "syntax error".to_string()
        };
        return Err(format!("{}:{}: {}", pos.row + 1, pos.column + 1, what));
    }

    Ok(GoSource {
        handlers: handler_names(root, source),
        templates: template_directives(root, source, dir),
    })
}

fn handler_names(root: Node, source: &str) -> Vec<String> {
    let mut cursor = root.walk();
    root.children(&mut cursor)
        .filter(|n| n.kind() == "function_declaration")
        .filter_map(|n| n.child_by_field_name("name"))
        .filter_map(|n| n.utf8_text(source.as_bytes()).ok())
        .filter(|name| classify_handler(name).is_some())
        .map(str::to_string)
        .collect()
}

fn template_directives(root: Node, source: &str, dir: &Path) -> Vec<PathBuf> {
    let mut templates = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "comment" {
            if let Ok(text) = node.utf8_text(source.as_bytes()) {
                if let Some(rest) = text.strip_prefix(TEMPLATE_DIRECTIVE) {
                    if rest.starts_with(char::is_whitespace) {
                        templates.extend(
                            rest.split_whitespace()
                                .map(|f| path_clean::clean(dir.join(f))),
                        );
                    }
                }
            }
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    templates
}

/// Template directives of a file, ignoring syntax errors elsewhere in it.
///
/// The scanner needs the links even while a handler file is mid-edit.
pub fn parse_template_directives(source: &str, dir: &Path) -> Vec<PathBuf> {
    match parse_tree(source) {
        Ok(tree) => template_directives(tree.root_node(), source, dir),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDLERS: &str = r#"package users

import (
	"html/template"
	"net/http"
)

//nova:template layout.html  users.html
func Render(t *template.Template, w http.ResponseWriter, r *http.Request) error {
	return t.Execute(w, nil)
}

func Get(w http.ResponseWriter, r *http.Request) {}

func POST(w http.ResponseWriter, r *http.Request) {}

func get(w http.ResponseWriter, r *http.Request) {}

func Helper() {}

type server struct{}

func (s *server) Put(w http.ResponseWriter, r *http.Request) {}
"#;

    #[test]
    fn test_handlers_and_directives() {
        let parsed = parse_source(HANDLERS, Path::new("/site/src/pages/users")).unwrap();
        assert_eq!(parsed.handlers, vec!["Render", "Get", "POST"]);
        assert_eq!(
            parsed.templates,
            vec![
                PathBuf::from("/site/src/pages/users/layout.html"),
                PathBuf::from("/site/src/pages/users/users.html"),
            ]
        );
    }

    #[test]
    fn test_no_handlers() {
        let parsed = parse_source("package util\n\nfunc Helper() {}\n", Path::new("/x")).unwrap();
        assert!(parsed.handlers.is_empty());
        assert!(parsed.templates.is_empty());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = parse_source("package x\n\nfunc Get() {}\n\n@\n", Path::new("/x")).unwrap_err();
        assert_eq!(err, "5:1: syntax error");
    }

    #[test]
    fn test_directive_needs_separator() {
        let src = "package x\n\n//nova:templates a.html\nfunc Render() {}\n";
        let parsed = parse_source(src, Path::new("/x")).unwrap();
        assert!(parsed.templates.is_empty());
    }

    #[test]
    fn test_directive_relative_parent() {
        let src = "package x\n\n//nova:template ../shared/base.html\nfunc Render() {}\n";
        let templates = parse_template_directives(src, Path::new("/site/pages/blog"));
        assert_eq!(templates, vec![PathBuf::from("/site/pages/shared/base.html")]);
    }

    #[test]
    fn test_classify_handler() {
        assert_eq!(classify_handler("Render"), Some(HandlerName::Render));
        assert_eq!(classify_handler("RENDER"), Some(HandlerName::Render));
        assert_eq!(classify_handler("Delete"), Some(HandlerName::Verb("DELETE")));
        assert_eq!(classify_handler("render"), None);
        assert_eq!(classify_handler("Fetch"), None);
    }
}
