//! Runtime state and control-message application.

use super::hub::Hub;
use super::message::{Change, Message};
use super::router::DynamicRouter;
use super::vfs::VirtualFs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

/// Everything a control message can mutate.
#[derive(Debug, Default)]
pub struct Runtime {
    pub fs: VirtualFs,
    pub router: DynamicRouter,
    pub hub: Hub,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `message` and notify clients once.
    ///
    /// A bulk message applies its parts in order and yields a single
    /// aggregated change. Returns the change that was published.
    pub fn apply(&self, message: Message) -> Change {
        let mut change = Change::default();
        self.apply_into(message, &mut change);
        if !change.is_empty() {
            self.hub.publish(&change.to_json());
        }
        change
    }

    fn apply_into(&self, message: Message, change: &mut Change) {
        match message {
            Message::Bulk { messages } => {
                for message in messages {
                    self.apply_into(message, change);
                }
            }
            Message::CreateFile { filename, contents } => {
                self.fs.write(&filename, contents);
                change.created.push(filename);
            }
            Message::UpdateFile { filename, contents } => {
                self.fs.write(&filename, contents);
                change.updated.push(filename);
            }
            Message::DeleteFile { filename } => {
                self.fs.remove(&filename);
                change.deleted.push(filename);
            }
            Message::CreateRoute { pattern, module } => {
                self.router.add(&pattern, &module);
                change.created.push(pattern);
            }
            Message::UpdateRoute { pattern } => {
                change.updated.push(pattern);
            }
            Message::DeleteRoute { pattern } => {
                self.router.remove(&pattern);
                change.deleted.push(pattern);
            }
        }
    }

    /// Apply every line read from `input` until it closes or `cancel` fires.
    ///
    /// Undecodable lines are logged and skipped.
    pub async fn consume<R>(&self, input: R, cancel: CancellationToken)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match Message::from_line(&line) {
                    Ok(message) => {
                        tracing::debug!("control message with {} operation(s)", message.len());
                        self.apply(message);
                    }
                    Err(e) => tracing::warn!("{}", e),
                },
                Ok(None) => {
                    tracing::debug!("control channel closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!("control channel failed: {}", e);
                    break;
                }
            }
        }
    }
}
