//! deeplocal-daemon: background service for local double-copy translation
//!
//! This daemon runs alongside the translator window and provides:
//! - Supervision of the native key monitor (`key-listener`)
//! - Double Cmd+C detection and clipboard capture
//! - Debounced, cancellable translation against a local Ollama server
//! - IPC server for the UI
//!
//! If the key monitor binary is missing the daemon keeps running and the
//! translator stays usable through the UI alone.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use deeplocal::clipboard::SystemClipboard;
use deeplocal::config::Config;
use deeplocal::events::TranslatorEvent;
use deeplocal::gesture::{forward_gestures, DoubleTapDetector};
use deeplocal::ipc::Server;
use deeplocal::lifecycle::{ShutdownFlag, ShutdownSignal};
use deeplocal::monitor::{resolve_monitor_binary, MonitorCommand, Supervisor, SupervisorHandle};
use deeplocal::translate::{OllamaClient, Orchestrator, OrchestratorHandle, OrchestratorSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "deeplocal-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, service = %config.service_url, "configuration loaded");

    let shutdown = ShutdownSignal::new();
    let shutdown_flag = ShutdownFlag::new();

    // Orchestrator and hotkey pipeline -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<TranslatorEvent>(256);

    let service = OllamaClient::new(&config.service_url, config.request_timeout)?;
    let (orchestrator, orchestrator_task) = Orchestrator::new(
        OrchestratorSettings::from_config(&config),
        Arc::new(service),
        event_tx.clone(),
    )
    .spawn();

    if orchestrator.refresh_models().await.is_err() {
        warn!("orchestrator stopped before the initial model refresh");
    }

    let supervisor = start_hotkeys(&config, &shutdown_flag, &orchestrator, &event_tx).await;

    let server = Server::new(&config.socket_path, orchestrator.clone(), event_tx.clone())?;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    // Set before killing the monitor so its exit is not treated as a crash
    shutdown_flag.trigger();
    if let Some(supervisor) = supervisor {
        supervisor.shutdown().await;
    }
    server.shutdown().await;

    drop(orchestrator);
    orchestrator_task.abort();

    info!("deeplocal-daemon stopped");

    Ok(())
}

/// Launch the key monitor and gesture pipeline.
///
/// Returns `None` when the monitor binary cannot be located; the UI is
/// told through [`TranslatorEvent::MonitorUnavailable`].
async fn start_hotkeys(
    config: &Config,
    shutdown_flag: &ShutdownFlag,
    orchestrator: &OrchestratorHandle,
    event_tx: &broadcast::Sender<TranslatorEvent>,
) -> Option<SupervisorHandle> {
    let candidates = config.monitor_candidates();
    let program = match resolve_monitor_binary(&candidates) {
        Ok(program) => program,
        Err(e) => {
            error!(%e, "key monitor unavailable");
            warn!("continuing without hotkey support");
            let path = candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = event_tx.send(TranslatorEvent::MonitorUnavailable { path });
            return None;
        }
    };
    info!(program = %program.display(), "key monitor located");

    let timings = config.timings;
    let (supervisor_tx, supervisor_rx) = mpsc::channel(64);
    let (fired_tx, fired_rx) = mpsc::channel(8);

    let (supervisor, _supervisor_task) = Supervisor::spawn(
        MonitorCommand::new(&program),
        timings.restart_delay,
        shutdown_flag.subscribe(),
        supervisor_tx,
    );

    let mut detector = DoubleTapDetector::new(timings.double_tap_window);
    let notices = event_tx.clone();
    tokio::spawn(async move { detector.run(supervisor_rx, fired_tx, notices).await });

    tokio::spawn(forward_gestures(
        fired_rx,
        Arc::new(SystemClipboard::new()),
        timings.settle_delay,
        orchestrator.clone(),
        event_tx.clone(),
    ));

    match supervisor.start().await {
        Ok(()) => info!("key monitor started"),
        // The UI hears about this through the detector's SpawnFailed relay
        Err(e) => {
            error!(%e, "failed to start key monitor");
            warn!("continuing without hotkey support - check Accessibility permissions");
        }
    }

    Some(supervisor)
}
