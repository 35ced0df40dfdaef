//! key-listener: native key monitor for deeplocal
//!
//! Observes system-wide key-downs through a listen-only event tap and
//! writes one protocol token per line to stdout. Diagnostics go to stderr.
//! Exits with status 1 if the tap cannot be created or is disabled by
//! the system.

use std::io::Write;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deeplocal::hotkey::run_key_tap;
use deeplocal::monitor::MonitorToken;

fn emit(token: MonitorToken) {
    let mut stdout = std::io::stdout().lock();
    // Flush per token: the supervisor reads line by line
    let _ = writeln!(stdout, "{token}");
    let _ = stdout.flush();
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "key-listener starting");

    if let Err(e) = run_key_tap(emit) {
        error!(%e, "key tap unavailable");
        if e.writes_failure_token() {
            emit(MonitorToken::TapFailed);
        }
        std::process::exit(1);
    }

    info!("key-listener run loop exited");
}
