//! Filename to modification-time snapshots and their diff.

use crate::error::{CliError, Result};
use globset::GlobSet;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Last observed modification time of every watched file.
pub type FileSnapshot = HashMap<PathBuf, SystemTime>;

/// Paths that changed between two snapshots. No order within a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEvents {
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl FileEvents {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Whether the file name of `path` matches one of `globs`.
pub fn matches_name(globs: &GlobSet, path: &Path) -> bool {
    path.file_name().is_some_and(|name| globs.is_match(name))
}

/// Walk `root` and record every regular file whose name matches `globs`.
pub fn scan_files(root: &Path, globs: &GlobSet) -> Result<FileSnapshot> {
    let mut files = FileSnapshot::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| CliError::Scan {
            root: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() || !matches_name(globs, entry.path()) {
            continue;
        }
        // Vanished between readdir and stat: the next cycle reports it.
        let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
            continue;
        };
        files.insert(entry.into_path(), modified);
    }
    Ok(files)
}

/// Re-stat already known files. Files that no longer exist are left out.
pub fn lookup_files<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> FileSnapshot {
    paths
        .into_iter()
        .filter_map(|path| {
            let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
            Some((path.clone(), modified))
        })
        .collect()
}

/// Compare `old` against `new`.
///
/// A path only in `new` is created, only in `old` deleted, and in both with a
/// strictly later time updated.
pub fn diff(old: &FileSnapshot, new: &FileSnapshot) -> FileEvents {
    let mut events = FileEvents::default();

    for (path, last) in old {
        match new.get(path) {
            Some(current) if current > last => events.updated.push(path.clone()),
            Some(_) => {}
            None => events.deleted.push(path.clone()),
        }
    }

    events.created = new
        .keys()
        .filter(|path| !old.contains_key(*path))
        .cloned()
        .collect();

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::{Glob, GlobSetBuilder};
    use std::time::Duration;
    use tempfile::TempDir;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn snapshot(entries: &[(&str, u64)]) -> FileSnapshot {
        entries
            .iter()
            .map(|(p, t)| (PathBuf::from(p), at(*t)))
            .collect()
    }

    fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths.sort();
        paths
    }

    #[test]
    fn test_diff_classifies_every_path() {
        let old = snapshot(&[("/a", 1), ("/b", 1), ("/c", 5), ("/d", 1)]);
        let new = snapshot(&[("/a", 1), ("/b", 2), ("/c", 4), ("/e", 1)]);
        let events = diff(&old, &new);

        assert_eq!(events.created, vec![PathBuf::from("/e")]);
        assert_eq!(events.updated, vec![PathBuf::from("/b")]);
        assert_eq!(events.deleted, vec![PathBuf::from("/d")]);
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let old = snapshot(&[("/a", 1), ("/b", 2)]);
        assert!(diff(&old, &old.clone()).is_empty());
        assert!(diff(&FileSnapshot::new(), &FileSnapshot::new()).is_empty());
    }

    #[test]
    fn test_diff_from_empty() {
        let new = snapshot(&[("/a", 1), ("/b", 2)]);
        let events = diff(&FileSnapshot::new(), &new);
        assert_eq!(sorted(events.created), vec![PathBuf::from("/a"), PathBuf::from("/b")]);

        let events = diff(&new, &FileSnapshot::new());
        assert_eq!(sorted(events.deleted), vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_scan_and_lookup() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("users")).unwrap();
        std::fs::write(root.join("index.go"), "package pages").unwrap();
        std::fs::write(root.join("users/get.go"), "package users").unwrap();
        std::fs::write(root.join("app.ts"), "").unwrap();

        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("*.go").unwrap());
        let globs = builder.build().unwrap();

        let files = scan_files(root, &globs).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains_key(&root.join("users/get.go")));

        std::fs::remove_file(root.join("index.go")).unwrap();
        let known: Vec<PathBuf> = files.keys().cloned().collect();
        let looked_up = lookup_files(&known);
        assert_eq!(looked_up.len(), 1);
        assert_eq!(diff(&files, &looked_up).deleted, vec![root.join("index.go")]);
    }
}
