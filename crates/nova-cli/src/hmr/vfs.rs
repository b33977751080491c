//! In-memory file store backing asset requests in development.

use crate::error::RuntimeError;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Filename to contents. Names are slash separated, without a leading slash.
#[derive(Debug, Default)]
pub struct VirtualFs {
    files: RwLock<HashMap<String, Bytes>>,
}

fn normalize(name: &str) -> &str {
    name.trim_start_matches('/')
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file.
    pub fn write(&self, name: &str, contents: Bytes) {
        tracing::debug!("vfs write {} ({} bytes)", name, contents.len());
        self.files.write().insert(normalize(name).to_string(), contents);
    }

    /// Remove a file. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        tracing::debug!("vfs remove {}", name);
        self.files.write().remove(normalize(name)).is_some()
    }

    pub fn read(&self, name: &str) -> Result<Bytes, RuntimeError> {
        self.files
            .read()
            .get(normalize(name))
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.read().contains_key(normalize(name))
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Resolve a request path to a stored file, trying `index.html` for
    /// directories the way a static file server does.
    pub fn lookup(&self, path: &str) -> Option<(String, Bytes)> {
        let path = normalize(path);
        let candidates = if path.is_empty() || path.ends_with('/') {
            vec![format!("{}index.html", path)]
        } else {
            vec![path.to_string(), format!("{}/index.html", path)]
        };

        let files = self.files.read();
        candidates
            .into_iter()
            .find_map(|name| files.get(&name).cloned().map(|contents| (name, contents)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_remove() {
        let fs = VirtualFs::new();
        fs.write("app.js", Bytes::from_static(b"x"));
        assert_eq!(fs.read("app.js").unwrap(), Bytes::from_static(b"x"));
        assert_eq!(fs.read("/app.js").unwrap(), Bytes::from_static(b"x"));

        assert!(fs.remove("app.js"));
        let err = fs.read("app.js").unwrap_err();
        assert_eq!(err.to_string(), "app.js: not found");
        assert!(!fs.remove("app.js"));
    }

    #[test]
    fn test_lookup_index() {
        let fs = VirtualFs::new();
        fs.write("index.html", Bytes::from_static(b"root"));
        fs.write("blog/index.html", Bytes::from_static(b"blog"));

        assert_eq!(fs.lookup("/").unwrap().0, "index.html");
        assert_eq!(fs.lookup("/blog").unwrap().1, Bytes::from_static(b"blog"));
        assert_eq!(fs.lookup("/blog/").unwrap().0, "blog/index.html");
        assert!(fs.lookup("/missing.js").is_none());
    }
}
