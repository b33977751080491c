//! Hot-module-replacement runtime.
//!
//! Runs as the `nova runtime` child of a dev session configured with
//! `server.runtime = "native"`, in place of the generated Go dev server, and
//! speaks the same control protocol. It keeps bundled assets
//! in a [`VirtualFs`], registered route patterns in a [`DynamicRouter`], and
//! pushes change events to browsers through the [`Hub`]. The orchestrator
//! drives it with [`Message`] lines on stdin; requests matching a route are
//! executed by the route module generated for that route's directory.

pub mod hub;
pub mod message;
pub mod route_module;
pub mod router;
pub mod runtime;
pub mod server;
pub mod vfs;

pub use hub::{Hub, Subscription};
pub use message::{Change, Message};
pub use route_module::{RequestHead, ResponseHead, RouteModules};
pub use router::{DynamicRouter, Mux, Target};
pub use runtime::Runtime;
pub use server::{AppState, HMR_CLIENT_PATH, HMR_EVENTS_PATH, NODE_MODULES_PREFIX, app};
pub use vfs::VirtualFs;

use crate::codegen::DevManifest;
use crate::error::{CliError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve until stdin closes or the process is interrupted.
pub async fn serve(manifest: DevManifest) -> Result<()> {
    let runtime = Arc::new(Runtime::new());
    let shutdown = CancellationToken::new();

    let state = AppState {
        runtime: Arc::clone(&runtime),
        modules: RouteModules::new(
            manifest.go.clone(),
            manifest.root.clone(),
            manifest.pages_dir.clone(),
            manifest.route_module_concurrency,
        ),
        vendor_dir: manifest.vendor_dir.clone(),
        shutdown: shutdown.clone(),
    };

    let addr = manifest.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;
    tracing::info!("Runtime listening on http://{}", addr);

    let control = {
        let runtime = Arc::clone(&runtime);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            runtime
                .consume(BufReader::new(tokio::io::stdin()), shutdown.clone())
                .await;
            shutdown.cancel();
        })
    };

    let signal = {
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("Runtime interrupted");
                    shutdown.cancel();
                }
            }
        }
    };

    let result = axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .await
    .map_err(|e| CliError::Server(format!("Server error: {}", e)));

    shutdown.cancel();
    control.abort();
    result
}
