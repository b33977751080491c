//! Polling file watcher.
//!
//! Every `sync` interval the whole root is walked again, which is how new
//! files are found. Between walks, every `discovery` interval only the files
//! already known are re-checked, so edits and deletions surface sooner. Each
//! change set is diffed against the previous snapshot and handed to the
//! matching callbacks.

mod dispatcher;
mod snapshot;

pub use dispatcher::{Callbacks, Event, Handler, compile_key};
pub use snapshot::{FileEvents, FileSnapshot, diff, lookup_files, scan_files};

use crate::config::WatcherConfig;
use crate::error::{CliError, Result};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Watches one root directory until cancelled.
pub struct Watcher {
    root: PathBuf,
    callbacks: Callbacks,
    discovery: Duration,
    sync: Duration,
}

impl Watcher {
    pub fn new(root: impl Into<PathBuf>, callbacks: Callbacks, config: &WatcherConfig) -> Self {
        Self {
            root: root.into(),
            callbacks,
            discovery: config.discovery_interval(),
            sync: config.sync_interval(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Poll until `cancel` fires.
    ///
    /// The first walk only establishes the baseline; files present at start
    /// produce no events. A failed walk is logged and retried on the next tick.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let globs = self.callbacks.glob_set()?;
        let mut snapshot = walk(&self.root, &globs).await?;
        tracing::debug!(
            "Watching {} ({} files, keys: {})",
            self.root.display(),
            snapshot.len(),
            self.callbacks.keys().collect::<Vec<_>>().join(" ")
        );

        let start = Instant::now();
        let mut sync = interval_at(start + self.sync, self.sync);
        sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut discovery = interval_at(start + self.discovery, self.discovery);
        discovery.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sync.tick() => walk(&self.root, &globs).await,
                _ = discovery.tick() => stat(&self.root, &snapshot).await,
            };
            let next = match next {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!("{}", e);
                    continue;
                }
            };

            let events = diff(&snapshot, &next);
            snapshot = next;
            if !events.is_empty() {
                self.callbacks.dispatch(&events);
            }
        }

        tracing::debug!("Stopped watching {}", self.root.display());
        Ok(())
    }
}

fn join_error(root: &Path, e: tokio::task::JoinError) -> CliError {
    CliError::Scan {
        root: root.to_path_buf(),
        message: e.to_string(),
    }
}

/// [`scan_files`] on the blocking pool.
async fn walk(root: &Path, globs: &GlobSet) -> Result<FileSnapshot> {
    let (dir, globs) = (root.to_path_buf(), globs.clone());
    tokio::task::spawn_blocking(move || scan_files(&dir, &globs))
        .await
        .map_err(|e| join_error(root, e))?
}

/// [`lookup_files`] for everything in `snapshot`, on the blocking pool.
async fn stat(root: &Path, snapshot: &FileSnapshot) -> Result<FileSnapshot> {
    let paths: Vec<PathBuf> = snapshot.keys().cloned().collect();
    tokio::task::spawn_blocking(move || lookup_files(&paths))
        .await
        .map_err(|e| join_error(root, e))
}
