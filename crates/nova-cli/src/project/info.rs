//! Project root and Go module discovery.

use crate::error::{CliError, Result, ResultExt};
use std::path::{Component, Path, PathBuf};

/// Root directory and module path of the Go project being served.
///
/// Built once per command and handed to every component that needs to resolve
/// project-relative paths or import paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    root: PathBuf,
    module_name: String,
}

impl ProjectInfo {
    pub fn new(root: impl Into<PathBuf>, module_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            module_name: module_name.into(),
        }
    }

    /// Walk up from `start` to the nearest directory holding a `go.mod`.
    pub fn discover(start: &Path) -> Result<Self> {
        let root = start
            .ancestors()
            .find(|dir| dir.join("go.mod").is_file())
            .ok_or_else(|| {
                CliError::Custom(format!(
                    "golang project not found from {}\n\nHint: Run nova inside a directory containing go.mod",
                    start.display()
                ))
            })?
            .to_path_buf();

        let go_mod = root.join("go.mod");
        let contents = std::fs::read_to_string(&go_mod).with_path(&go_mod)?;
        let module_name = parse_module_name(&contents).ok_or_else(|| {
            CliError::Custom(format!("module name not found in {}", go_mod.display()))
        })?;

        tracing::debug!("Project root {} (module {})", root.display(), module_name);
        Ok(Self { root, module_name })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Resolve `path` against the project root unless it is already absolute.
    pub fn abs(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            path_clean::clean(self.root.join(path))
        }
    }

    /// Project-relative form of an absolute path inside the project.
    pub fn rel<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    /// Go import path of the package living in `dir`.
    pub fn import_path(&self, dir: &Path) -> String {
        let rel = self.rel(dir).map(to_slash).unwrap_or_default();
        if rel.is_empty() {
            self.module_name.clone()
        } else {
            format!("{}/{}", self.module_name, rel)
        }
    }
}

/// Extract the module path from the contents of a go.mod file.
pub fn parse_module_name(go_mod: &str) -> Option<String> {
    go_mod
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("module"))
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            (parts.next() == Some("module"))
                .then(|| parts.next())
                .flatten()
                .map(|name| name.trim_matches('"').to_string())
        })
}

/// Slash-separated rendering of a relative path.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_module_name() {
        assert_eq!(
            parse_module_name("// comment\nmodule example.com/app\n\ngo 1.23\n"),
            Some("example.com/app".to_string())
        );
        assert_eq!(parse_module_name("go 1.23\n"), None);
        assert_eq!(parse_module_name("modules foo\n"), None);
    }

    #[test]
    fn test_discover_walks_up() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("go.mod"), "module example.com/site\n").unwrap();
        let nested = temp.path().join("src/pages/users");
        fs::create_dir_all(&nested).unwrap();

        let info = ProjectInfo::discover(&nested).unwrap();
        assert_eq!(info.root(), temp.path());
        assert_eq!(info.module_name(), "example.com/site");
    }

    #[test]
    fn test_discover_without_go_mod() {
        let temp = TempDir::new().unwrap();
        assert!(ProjectInfo::discover(temp.path()).is_err());
    }

    #[test]
    fn test_import_path() {
        let info = ProjectInfo::new("/work/site", "example.com/site");
        assert_eq!(
            info.import_path(Path::new("/work/site/src/pages/users")),
            "example.com/site/src/pages/users"
        );
        assert_eq!(info.import_path(Path::new("/work/site")), "example.com/site");
    }

    #[test]
    fn test_abs_and_rel() {
        let info = ProjectInfo::new("/work/site", "m");
        assert_eq!(info.abs("src/pages"), PathBuf::from("/work/site/src/pages"));
        assert_eq!(info.abs("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(
            info.rel(Path::new("/work/site/.nova/main.go")),
            Some(Path::new(".nova/main.go"))
        );
    }
}
