//! Route patterns registered in the running server.
//!
//! Patterns use the `[METHOD ]PATH` form of the generated handlers. The
//! pattern set is mutated under a lock, and every mutation builds a fresh
//! [`Mux`] that replaces the previous one as a whole. A request holding the
//! old mux finishes against it.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const REST_PARAM: &str = "{*nova_rest}";

/// What a matched request is dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The registered pattern, as sent in `CreateRoute`
    pub pattern: String,
    /// Route module directory relative to the generated pages directory
    pub module: String,
}

/// Immutable matcher built from one version of the pattern set.
#[derive(Default)]
pub struct Mux {
    by_method: HashMap<String, matchit::Router<Target>>,
    any_method: matchit::Router<Target>,
    len: usize,
}

/// Split `GET /users` into `(Some("GET"), "/users")`.
pub fn split_pattern(pattern: &str) -> (Option<&str>, &str) {
    match pattern.trim().split_once(char::is_whitespace) {
        Some((method, path)) => (Some(method), path.trim_start()),
        None => (None, pattern.trim()),
    }
}

/// Translate a pattern path into the paths inserted into the matcher.
///
/// `/{$}` suffixes match exactly, a trailing slash matches the whole subtree,
/// and `{name...}` becomes a catch-all.
fn matcher_paths(path: &str) -> Vec<String> {
    let path = rewrite_wildcards(path);
    if let Some(exact) = path.strip_suffix("{$}") {
        return vec![exact.to_string()];
    }
    if path.ends_with('/') && !path.contains("{*") {
        return vec![path.clone(), format!("{}{}", path, REST_PARAM)];
    }
    vec![path]
}

fn rewrite_wildcards(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix("...}"))
            {
                Some(name) => format!("{{*{}}}", name),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl Mux {
    fn build(routes: &BTreeMap<String, Target>) -> Self {
        let mut mux = Mux::default();
        for (pattern, target) in routes {
            let (method, path) = split_pattern(pattern);
            let router = match method {
                Some(m) => mux.by_method.entry(m.to_ascii_uppercase()).or_default(),
                None => &mut mux.any_method,
            };
            for path in matcher_paths(path) {
                if let Err(e) = router.insert(path.as_str(), target.clone()) {
                    tracing::warn!("Cannot register {}: {}", pattern, e);
                }
            }
            mux.len += 1;
        }
        mux
    }

    /// Find the target for a request. `HEAD` falls back to `GET` routes, and
    /// method-less patterns match any method.
    pub fn lookup(&self, method: &str, path: &str) -> Option<&Target> {
        let method = method.to_ascii_uppercase();
        let mut routers: Vec<&matchit::Router<Target>> = Vec::with_capacity(3);
        if let Some(r) = self.by_method.get(&method) {
            routers.push(r);
        }
        if method == "HEAD" {
            if let Some(r) = self.by_method.get("GET") {
                routers.push(r);
            }
        }
        routers.push(&self.any_method);

        routers
            .into_iter()
            .find_map(|router| router.at(path).ok().map(|m| m.value))
    }

    /// Number of patterns the mux was built from.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The pattern set plus the mux currently serving it.
#[derive(Default)]
pub struct DynamicRouter {
    routes: RwLock<BTreeMap<String, Target>>,
    mux: RwLock<Arc<Mux>>,
}

impl std::fmt::Debug for DynamicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicRouter")
            .field("patterns", &self.patterns())
            .finish()
    }
}

impl DynamicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern`. Registering it again only updates its module.
    pub fn add(&self, pattern: &str, module: &str) {
        tracing::debug!("route add {} -> {}", pattern, module);
        let mut routes = self.routes.write();
        routes.insert(
            pattern.to_string(),
            Target {
                pattern: pattern.to_string(),
                module: module.to_string(),
            },
        );
        self.swap(&routes);
    }

    /// Unregister `pattern`. Returns whether it was registered.
    pub fn remove(&self, pattern: &str) -> bool {
        tracing::debug!("route remove {}", pattern);
        let mut routes = self.routes.write();
        let removed = routes.remove(pattern).is_some();
        if removed {
            self.swap(&routes);
        }
        removed
    }

    fn swap(&self, routes: &BTreeMap<String, Target>) {
        let mux = Arc::new(Mux::build(routes));
        *self.mux.write() = mux;
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.routes.read().contains_key(pattern)
    }

    pub fn patterns(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }

    /// The mux to serve the next request with.
    pub fn mux(&self) -> Arc<Mux> {
        Arc::clone(&self.mux.read())
    }
}
