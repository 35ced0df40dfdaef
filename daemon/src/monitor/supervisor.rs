//! Key monitor process supervisor
//!
//! Owns the native monitor child process: spawns it, turns its stdout into
//! typed key events, respawns it after an unexpected exit and kills it on
//! shutdown. All process state lives inside a single actor task; other
//! components talk to it through [`SupervisorHandle`].

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::protocol::{KeyEvent, MonitorToken};

/// How long to wait for the output readers to drain after the child exits
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Events published by the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A monitor process was spawned
    Spawned { pid: Option<u32>, at: Instant },
    /// A recognised token arrived on the monitor's stdout
    Key(KeyEvent),
    /// The monitor exited without being asked to
    Exited { code: Option<i32>, at: Instant },
    /// The monitor could not be spawned; no retry follows
    SpawnFailed { path: PathBuf, reason: String },
}

/// Errors surfaced by the supervisor
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("key monitor binary not found at: {}", display_paths(.attempted))]
    MonitorNotFound { attempted: Vec<PathBuf> },

    #[error("failed to spawn key monitor {}: {source}", .path.display())]
    MonitorSpawnFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor is not running")]
    Closed,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick the first candidate that exists on disk
pub fn resolve_monitor_binary(candidates: &[PathBuf]) -> Result<PathBuf, SupervisorError> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| SupervisorError::MonitorNotFound {
            attempted: candidates.to_vec(),
        })
}

/// Program and arguments used to launch the monitor
#[derive(Debug, Clone)]
pub struct MonitorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl MonitorCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Snapshot of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub last_exit_code: Option<i32>,
    pub restart_scheduled_at: Option<Instant>,
}

/// The live child plus the tasks reading its pipes
struct MonitorProcessHandle {
    child: Child,
    pid: Option<u32>,
    readers: Vec<JoinHandle<()>>,
}

enum Control {
    Start(oneshot::Sender<Result<(), SupervisorError>>),
    Status(oneshot::Sender<MonitorStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to the supervisor actor
#[derive(Clone)]
pub struct SupervisorHandle {
    control_tx: mpsc::Sender<Control>,
}

impl SupervisorHandle {
    /// Spawn the monitor unless one is already running
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.control_tx
            .send(Control::Start(ack_tx))
            .await
            .map_err(|_| SupervisorError::Closed)?;
        ack_rx.await.map_err(|_| SupervisorError::Closed)?
    }

    pub async fn status(&self) -> Result<MonitorStatus, SupervisorError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.control_tx
            .send(Control::Status(ack_tx))
            .await
            .map_err(|_| SupervisorError::Closed)?;
        ack_rx.await.map_err(|_| SupervisorError::Closed)
    }

    /// Kill the monitor and stop the supervisor.
    ///
    /// Returns once the child has been reaped.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control_tx.send(Control::Shutdown(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

/// Supervisor actor state
pub struct Supervisor {
    command: MonitorCommand,
    restart_delay: Duration,
    shutdown: watch::Receiver<bool>,
    event_tx: mpsc::Sender<SupervisorEvent>,
    handle: Option<MonitorProcessHandle>,
    last_exit_code: Option<i32>,
    restart_at: Option<Instant>,
}

impl Supervisor {
    /// Create the actor and start its task. The monitor itself is not
    /// spawned until [`SupervisorHandle::start`] is called.
    pub fn spawn(
        command: MonitorCommand,
        restart_delay: Duration,
        shutdown: watch::Receiver<bool>,
        event_tx: mpsc::Sender<SupervisorEvent>,
    ) -> (SupervisorHandle, JoinHandle<()>) {
        let (control_tx, control_rx) = mpsc::channel(8);
        let supervisor = Self {
            command,
            restart_delay,
            shutdown,
            event_tx,
            handle: None,
            last_exit_code: None,
            restart_at: None,
        };
        let task = tokio::spawn(supervisor.run(control_rx));
        (SupervisorHandle { control_tx }, task)
    }

    async fn run(mut self, mut control_rx: mpsc::Receiver<Control>) {
        info!(program = %self.command.program.display(), "supervisor started");

        loop {
            tokio::select! {
                control = control_rx.recv() => match control {
                    Some(Control::Start(ack)) => {
                        let _ = ack.send(self.start().await);
                    }
                    Some(Control::Status(ack)) => {
                        let _ = ack.send(self.status());
                    }
                    Some(Control::Shutdown(ack)) => {
                        self.terminate().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.terminate().await;
                        break;
                    }
                },
                status = wait_for_exit(self.handle.as_mut()) => {
                    self.on_exit(status).await;
                }
                _ = sleep_until_restart(self.restart_at) => {
                    self.on_restart_timer().await;
                }
            }
        }

        info!("supervisor stopped");
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.handle.is_some(),
            pid: self.handle.as_ref().and_then(|h| h.pid),
            last_exit_code: self.last_exit_code,
            restart_scheduled_at: self.restart_at,
        }
    }

    async fn start(&mut self) -> Result<(), SupervisorError> {
        if self.handle.is_some() {
            debug!("key monitor already running");
            return Ok(());
        }
        self.restart_at = None;

        let mut child = match Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                error!(
                    program = %self.command.program.display(),
                    ?source,
                    "failed to spawn key monitor"
                );
                let _ = self
                    .event_tx
                    .send(SupervisorEvent::SpawnFailed {
                        path: self.command.program.clone(),
                        reason: source.to_string(),
                    })
                    .await;
                return Err(SupervisorError::MonitorSpawnFailure {
                    path: self.command.program.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        // Spawned goes out before any reader can forward a key event
        let _ = self
            .event_tx
            .send(SupervisorEvent::Spawned {
                pid,
                at: Instant::now(),
            })
            .await;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(read_stdout(stdout, self.event_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(log_stderr(stderr)));
        }

        info!(?pid, program = %self.command.program.display(), "key monitor spawned");
        self.handle = Some(MonitorProcessHandle {
            child,
            pid,
            readers,
        });
        Ok(())
    }

    async fn on_exit(&mut self, status: std::io::Result<ExitStatus>) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        // Let the readers flush whatever the child wrote before exiting
        for reader in handle.readers.iter_mut() {
            if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut *reader)
                .await
                .is_err()
            {
                reader.abort();
            }
        }

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(?e, "failed to wait on key monitor");
                None
            }
        };
        self.last_exit_code = code;
        warn!(pid = ?handle.pid, ?code, "key monitor exited");
        let exited_at = Instant::now();
        let _ = self
            .event_tx
            .send(SupervisorEvent::Exited {
                code,
                at: exited_at,
            })
            .await;

        if *self.shutdown.borrow() {
            info!("shutdown in progress, key monitor will not be restarted");
            return;
        }

        self.restart_at = Some(exited_at + self.restart_delay);
        info!(
            delay_ms = self.restart_delay.as_millis() as u64,
            "key monitor restart scheduled"
        );
    }

    async fn on_restart_timer(&mut self) {
        self.restart_at = None;
        if *self.shutdown.borrow() {
            debug!("restart timer fired during shutdown, ignoring");
            return;
        }
        // Spawn failures are reported inside start() and not retried
        let _ = self.start().await;
    }

    async fn terminate(&mut self) {
        self.restart_at = None;
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        if let Err(e) = handle.child.kill().await {
            warn!(?e, "failed to kill key monitor");
        }
        for reader in handle.readers.drain(..) {
            reader.abort();
        }
        info!(pid = ?handle.pid, "key monitor terminated");
    }
}

async fn wait_for_exit(handle: Option<&mut MonitorProcessHandle>) -> std::io::Result<ExitStatus> {
    match handle {
        Some(handle) => handle.child.wait().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_restart(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn read_stdout(stdout: ChildStdout, event_tx: mpsc::Sender<SupervisorEvent>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(?e, "failed to read key monitor output");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(token) = MonitorToken::parse(trimmed) else {
            debug!(line = trimmed, "ignoring unrecognised key monitor output");
            continue;
        };
        match token {
            MonitorToken::Started => info!("key monitor reports event tap active"),
            MonitorToken::GestureKeyDown => debug!("gesture key down"),
            MonitorToken::TapFailed => {
                warn!("key monitor could not create event tap - check Input Monitoring permission")
            }
        }

        let Some(kind) = token.event_kind() else {
            continue;
        };
        let event = KeyEvent::new(kind, Instant::now());
        if event_tx.send(SupervisorEvent::Key(event)).await.is_err() {
            return;
        }
    }
    debug!("key monitor stdout closed");
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            warn!(target: "key_listener", "{}", line.trim_end());
        }
    }
}
