//! Fan-out of change notifications to connected browser clients.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Per-client buffer; a client further behind than this misses events.
const CLIENT_BUFFER: usize = 100;

type ClientRegistry = Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>;

/// Registry of subscribed clients.
#[derive(Debug, Clone, Default)]
pub struct Hub {
    clients: ClientRegistry,
    next_id: Arc<AtomicUsize>,
}

/// A client's end of the hub. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: usize,
    rx: mpsc::Receiver<String>,
    hub: Hub,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.write().insert(id, tx);
        tracing::debug!("hmr client {} connected", id);
        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    fn unsubscribe(&self, id: usize) {
        if self.clients.write().remove(&id).is_some() {
            tracing::debug!("hmr client {} disconnected", id);
        }
    }

    /// Queue `data` for every client without waiting on slow ones.
    ///
    /// Returns the number of clients it was queued for.
    pub fn publish(&self, data: &str) -> usize {
        let clients = self.clients.read().clone();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in clients {
            match tx.try_send(data.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("hmr client {} is behind, dropping event", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }

        for id in closed {
            self.unsubscribe(id);
        }
        delivered
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl Subscription {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Next event, or `None` once the hub dropped this client.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Already queued event, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}
