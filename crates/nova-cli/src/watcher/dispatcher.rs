//! Pattern-keyed callbacks and fire-and-forget dispatch.

use super::snapshot::{FileEvents, matches_name};
use crate::error::{CliError, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Kind of change a callback is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Event::Create => "create",
            Event::Update => "update",
            Event::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Reaction to changed files matching one pattern key.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, event: Event, files: Vec<PathBuf>) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Event, Vec<PathBuf>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Event, files: Vec<PathBuf>) -> Result<()> {
        (self)(event, files).await
    }
}

/// Compile a comma-separated list of file-name globs, e.g. `*.js,*.css`.
pub fn compile_key(key: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in key.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(pattern)
            .map_err(|e| CliError::InvalidArgument(format!("watch pattern {}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CliError::InvalidArgument(format!("watch pattern {}: {}", key, e)))
}

struct Callback {
    key: String,
    globs: GlobSet,
    handler: Arc<dyn Handler>,
}

/// Callbacks keyed by their pattern list.
///
/// Keys are independent: a file matching several keys reaches each of them.
#[derive(Default)]
pub struct Callbacks {
    entries: Vec<Callback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for files matching `key`.
    pub fn on(mut self, key: &str, handler: impl Handler) -> Result<Self> {
        self.entries.push(Callback {
            key: key.to_string(),
            globs: compile_key(key)?,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.key.as_str())
    }

    /// Union of every key's globs, used to filter the directory walk.
    pub fn glob_set(&self) -> Result<GlobSet> {
        let joined = self.keys().collect::<Vec<_>>().join(",");
        compile_key(&joined)
    }

    /// Files among `files` matching `key`.
    fn select(callback: &Callback, files: &[PathBuf]) -> Vec<PathBuf> {
        files
            .iter()
            .filter(|f| matches_name(&callback.globs, f))
            .cloned()
            .collect()
    }

    /// Spawn one task per (key, event) with matching files. Nothing is awaited;
    /// handler errors are logged.
    pub fn dispatch(&self, events: &FileEvents) {
        for (event, files) in [
            (Event::Create, &events.created),
            (Event::Update, &events.updated),
            (Event::Delete, &events.deleted),
        ] {
            if files.is_empty() {
                continue;
            }
            for callback in &self.entries {
                let target = Self::select(callback, files);
                if target.is_empty() {
                    continue;
                }
                tracing::debug!("{} {} file(s) for {}", event, target.len(), callback.key);
                let handler = Arc::clone(&callback.handler);
                let key = callback.key.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(event, target).await {
                        tracing::error!("{} handler for {} failed: {}", event, key, e);
                    }
                });
            }
        }
    }
}
