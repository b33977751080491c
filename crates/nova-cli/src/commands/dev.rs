//! Development server command implementation.
//!
//! Orchestrates the dev session lifecycle:
//! - Initial scan, generation and bundle
//! - Runtime child: the generated Go dev server, or `nova runtime`
//! - Polling watcher feeding the session
//! - Control messages forwarded to the runtime
//! - Graceful shutdown on Ctrl+C

use crate::cli::{DevArgs, GlobalArgs};
use crate::commands::utils;
use crate::config::DevRuntime;
use crate::error::Result;
use crate::project::DevSession;
use crate::runner::Runner;
use crate::ui;
use crate::watcher::Watcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How often the runtime child is checked for an unexpected exit.
const HEALTH_INTERVAL: Duration = Duration::from_secs(1);

/// Execute the dev command.
///
/// # Process Flow
///
/// 1. Discover the project and load configuration
/// 2. Start the session (scan, parse, generate, bundle)
/// 3. Start the runtime child
/// 4. Start the watcher on the pages root
/// 5. Forward queued control messages until Ctrl+C
pub async fn execute(args: DevArgs, global: &GlobalArgs) -> Result<()> {
    let (project, mut config) = utils::load_project(global)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    ui::info(&format!("Project: {}", project.root().display()));
    let bundler = Arc::new(utils::esbuild(&project, &config));
    let watcher_config = config.watcher.clone();
    let url = config.server.url();

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let session = DevSession::start(project, config, bundler, outbox).await?;

    let root = session.project().root();
    let mut runner = match session.config().server.runtime {
        DevRuntime::Generated => Runner::dev_server(&session.go(), &session.dev_server_path(), root),
        DevRuntime::Native => Runner::runtime(&session.manifest_path(), root)?,
    };
    runner.start().await?;

    let cancel = CancellationToken::new();
    let watcher = Watcher::new(session.pages_root(), session.callbacks()?, &watcher_config);
    ui::info(&format!("Watching {}", watcher.root().display()));
    let mut watch_task = tokio::spawn(watcher.run(cancel.clone()));

    ui::success(&format!("Dev server running at {}", url));
    ui::info("Press Ctrl+C to stop");

    let mut health = tokio::time::interval(HEALTH_INTERVAL);
    loop {
        tokio::select! {
            Some(message) = inbox.recv() => {
                if let Err(e) = runner.send(&message).await {
                    ui::warning(&format!("Could not reach the runtime: {}", e));
                }
            }

            _ = health.tick() => {
                if runner.check_exited().is_some() {
                    ui::error("The runtime exited; fix the error and restart nova dev");
                }
            }

            result = &mut watch_task => {
                match result {
                    Ok(Err(e)) => ui::error(&format!("Watcher stopped: {}", e)),
                    Err(e) => ui::error(&format!("Watcher task failed: {}", e)),
                    Ok(Ok(())) => {}
                }
                break;
            }

            _ = signal::ctrl_c() => {
                ui::info("Shutting down development server...");
                break;
            }
        }
    }

    cancel.cancel();
    runner.stop().await?;
    if !watch_task.is_finished() {
        watch_task.abort();
    }

    ui::success("Development server stopped");
    Ok(())
}
