//! Route discovery for handler-source files.
//!
//! A Go file under the pages root defines routes through its exported
//! functions: `Render` produces a render route, an HTTP verb name produces a
//! REST route. The URL path comes from the file's directory alone.

pub mod parser;

use crate::config::RouterConfig;
use crate::error::{CliError, Result, ResultExt};
use crate::project::{ProjectInfo, to_slash};
use parser::{HandlerName, classify_handler};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Marker appended to directory-index paths so they only match exactly.
pub const EXACT_MATCH: &str = "{$}";

/// Whether a route renders templates or is a plain REST handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Render,
    Rest,
}

/// One route, as discovered in a handler-source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    /// Upper-cased verb, or `RENDER`
    pub method: String,
    /// Full multiplexer pattern, e.g. `GET /api/users`
    pub pattern: String,
    /// Go import path of the package holding the handler
    pub package: String,
    /// Directory of the handler relative to the pages root, slash separated
    pub module: String,
    /// Function name as declared
    pub handler: String,
    pub kind: RouteKind,
    /// Absolute paths of the templates a render route executes
    pub templates: Vec<PathBuf>,
    /// Source file the route came from
    pub file: PathBuf,
}

/// Route as the generated server sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Route {
    Render(RenderRoute),
    Rest(RestRoute),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRoute {
    pub pattern: String,
    /// Template directory relative to the pages root
    pub root: String,
    /// Template files relative to `root`, in directive order
    pub templates: Vec<String>,
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRoute {
    pub pattern: String,
    pub handler: String,
}

impl RouteInfo {
    /// Identifier the generated program imports the handler package under.
    pub fn alias(&self) -> String {
        module_alias(&self.module)
    }

    pub fn to_route(&self) -> Route {
        match self.kind {
            RouteKind::Render => {
                let dir = self.file.parent().unwrap_or(Path::new(""));
                let templates = self
                    .templates
                    .iter()
                    .map(|t| match t.strip_prefix(dir) {
                        Ok(rel) => to_slash(rel),
                        Err(_) => to_slash(t),
                    })
                    .collect();
                Route::Render(RenderRoute {
                    pattern: self.pattern.clone(),
                    root: self.module.clone(),
                    templates,
                    handler: self.handler.clone(),
                })
            }
            RouteKind::Rest => Route::Rest(RestRoute {
                pattern: self.pattern.clone(),
                handler: self.handler.clone(),
            }),
        }
    }
}

/// Go identifier for the package in `module` (a pages-relative directory).
pub fn module_alias(module: &str) -> String {
    if module.is_empty() {
        return "pages".to_string();
    }
    let sanitized: String = module
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("pages_{}", sanitized)
}

/// Go identifiers for a set of modules, unique within the set.
///
/// Modules are visited in sorted order. One whose alias is already taken gets
/// the first free numeric suffix (`pages_a_b`, `pages_a_b_2`).
pub fn module_aliases<'a>(modules: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    let modules: BTreeSet<&str> = modules.into_iter().collect();
    let mut taken = HashSet::new();
    let mut aliases = BTreeMap::new();
    for module in modules {
        let base = module_alias(module);
        let mut alias = base.clone();
        let mut n = 2;
        while !taken.insert(alias.clone()) {
            alias = format!("{}_{}", base, n);
            n += 1;
        }
        aliases.insert(module.to_string(), alias);
    }
    aliases
}

/// URL path for handlers living in `dir`.
///
/// The root directory becomes `/{$}`; any other directory maps to its
/// slash-separated relative path.
pub fn route_path(pages_root: &Path, dir: &Path) -> String {
    let rel = dir.strip_prefix(pages_root).map(to_slash).unwrap_or_default();
    let mut path = path_clean::clean(format!("/{}", rel))
        .to_string_lossy()
        .replace('\\', "/");
    if path.ends_with('/') {
        path.push_str(EXACT_MATCH);
    }
    path
}

/// Prefix `path` with the REST base, keeping a single separator between them.
pub fn with_api_base(api_base: &str, path: &str) -> String {
    let base = api_base.trim_end_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    format!("{}{}", base, path)
}

/// Parse one handler-source file into its routes.
///
/// Files without route-defining functions yield an empty list.
pub fn parse_file(
    project: &ProjectInfo,
    config: &RouterConfig,
    file: &Path,
) -> Result<Vec<RouteInfo>> {
    let source = std::fs::read_to_string(file).with_path(file)?;
    parse_source(project, config, file, &source)
}

/// Same as [`parse_file`] with the contents already in hand.
pub fn parse_source(
    project: &ProjectInfo,
    config: &RouterConfig,
    file: &Path,
    source: &str,
) -> Result<Vec<RouteInfo>> {
    let dir = file.parent().unwrap_or(Path::new("/"));
    let parsed = parser::parse_source(source, dir).map_err(|message| CliError::Parse {
        file: file.to_path_buf(),
        message,
    })?;

    let pages_root = project.abs(&config.pages);
    let path = route_path(&pages_root, dir);
    let module = dir.strip_prefix(&pages_root).map(to_slash).unwrap_or_default();
    let package = project.import_path(dir);

    let mut routes: Vec<RouteInfo> = Vec::new();
    for handler in parsed.handlers {
        let Some(name) = classify_handler(&handler) else {
            continue;
        };
        let (method, pattern, kind, templates) = match name {
            HandlerName::Render => (
                "RENDER".to_string(),
                format!("GET {}", path),
                RouteKind::Render,
                parsed.templates.clone(),
            ),
            HandlerName::Verb(verb) => (
                verb.to_string(),
                format!("{} {}", verb, with_api_base(&config.api_base, &path)),
                RouteKind::Rest,
                Vec::new(),
            ),
        };

        if let Some(pos) = routes.iter().position(|r| r.pattern == pattern) {
            tracing::warn!(
                "{}: {} and {} both define {}; using {}",
                file.display(),
                routes[pos].handler,
                handler,
                pattern,
                handler
            );
            routes.remove(pos);
        }

        tracing::debug!("{} {} ({})", method, pattern, file.display());
        routes.push(RouteInfo {
            method,
            pattern,
            package: package.clone(),
            module: module.clone(),
            handler,
            kind,
            templates,
            file: file.to_path_buf(),
        });
    }
    Ok(routes)
}

/// Every known route, keyed by the source file that defines it.
///
/// The routes of one file are always replaced or removed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    files: BTreeMap<PathBuf, Vec<RouteInfo>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every file, skipping (and returning) the ones that fail.
    pub fn from_files<'a>(
        project: &ProjectInfo,
        config: &RouterConfig,
        files: impl IntoIterator<Item = &'a PathBuf>,
    ) -> (Self, Vec<CliError>) {
        let mut table = Self::new();
        let mut errors = Vec::new();
        for file in files {
            match parse_file(project, config, file) {
                Ok(routes) => {
                    table.replace(file.clone(), routes);
                }
                Err(e) => errors.push(e),
            }
        }
        (table, errors)
    }

    /// Install the routes of `file`, returning the ones it had before.
    pub fn replace(&mut self, file: PathBuf, routes: Vec<RouteInfo>) -> Vec<RouteInfo> {
        self.files.insert(file, routes).unwrap_or_default()
    }

    /// Drop every route of `file`, returning them.
    pub fn remove(&mut self, file: &Path) -> Vec<RouteInfo> {
        self.files.remove(file).unwrap_or_default()
    }

    pub fn get(&self, file: &Path) -> &[RouteInfo] {
        self.files.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys()
    }

    /// All routes with unique patterns, sorted by pattern.
    ///
    /// When two files register the same pattern the one sorting last wins.
    pub fn routes(&self) -> Vec<&RouteInfo> {
        let mut by_pattern: BTreeMap<&str, &RouteInfo> = BTreeMap::new();
        for route in self.files.values().flatten() {
            by_pattern.insert(&route.pattern, route);
        }
        by_pattern.into_values().collect()
    }

    pub fn patterns(&self) -> BTreeSet<String> {
        self.files
            .values()
            .flatten()
            .map(|r| r.pattern.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.routes().len()
    }

    /// Routes grouped by pages-relative directory.
    pub fn modules(&self) -> BTreeMap<String, Vec<&RouteInfo>> {
        let mut modules: BTreeMap<String, Vec<&RouteInfo>> = BTreeMap::new();
        for route in self.routes() {
            modules.entry(route.module.clone()).or_default().push(route);
        }
        modules
    }

    /// Routes served by the handler package in `module`.
    pub fn module_routes(&self, module: &str) -> Vec<&RouteInfo> {
        self.routes()
            .into_iter()
            .filter(|r| r.module == module)
            .collect()
    }

    /// Render routes executing `template`.
    pub fn render_routes_using(&self, template: &Path) -> Vec<&RouteInfo> {
        self.routes()
            .into_iter()
            .filter(|r| r.kind == RouteKind::Render && r.templates.iter().any(|t| t == template))
            .collect()
    }

    /// Patterns registered by more than one file, with the files involved.
    pub fn conflicts(&self) -> Vec<(String, Vec<PathBuf>)> {
        let mut owners: BTreeMap<&str, Vec<PathBuf>> = BTreeMap::new();
        for (file, routes) in &self.files {
            for route in routes {
                owners.entry(&route.pattern).or_default().push(file.clone());
            }
        }
        owners
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(pattern, files)| (pattern.to_string(), files))
            .collect()
    }

    /// Log every cross-file pattern collision.
    pub fn warn_conflicts(&self) {
        for (pattern, files) in self.conflicts() {
            let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
            tracing::warn!("{} is defined in {}; the last one wins", pattern, names.join(", "));
        }
    }
}
