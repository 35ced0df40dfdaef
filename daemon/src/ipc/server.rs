//! Unix domain socket server for IPC
//!
//! Provides request-response communication with the UI and pushes
//! translator events to subscribed clients.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::TranslatorEvent;
use crate::translate::{OrchestratorClosed, OrchestratorHandle};

use super::protocol::{DaemonStatus, Outgoing, Request, Response, MAX_FRAME_LEN};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    orchestrator: OrchestratorHandle,
    event_tx: broadcast::Sender<TranslatorEvent>,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

/// What a connection handler needs from the server
#[derive(Clone)]
struct ClientContext {
    orchestrator: OrchestratorHandle,
    event_tx: broadcast::Sender<TranslatorEvent>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        orchestrator: OrchestratorHandle,
        event_tx: broadcast::Sender<TranslatorEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            orchestrator,
            event_tx,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let ctx = ClientContext {
                        orchestrator: self.orchestrator.clone(),
                        event_tx: self.event_tx.clone(),
                        start_time: self.start_time,
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, ctx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, ctx: ClientContext) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::channel::<Outgoing>(64);

        // Replies and pushed events share one writer so frames never interleave
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    debug!(?e, "client write failed");
                    break;
                }
            }
        });

        let mut forwarder = None;
        let result = loop {
            let body = match read_frame(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            let response = match serde_json::from_slice::<Request>(&body) {
                Ok(request) => {
                    debug!(?request, "received request");
                    if request == Request::Subscribe && forwarder.is_none() {
                        forwarder = Some(tokio::spawn(forward_events(
                            ctx.event_tx.subscribe(),
                            out_tx.clone(),
                        )));
                        debug!("client subscribed to notifications");
                    }
                    Self::process_request(request, &ctx).await
                }
                Err(e) => {
                    warn!(?e, "failed to parse request");
                    Response::Error {
                        code: "bad_request".to_string(),
                        message: "request is not valid JSON for any known type".to_string(),
                    }
                }
            };

            if out_tx.send(Outgoing::Response(response)).await.is_err() {
                break Ok(());
            }
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        drop(out_tx);
        let _ = writer_task.await;

        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, ctx: &ClientContext) -> Response {
        let orchestrator = &ctx.orchestrator;
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => match orchestrator.snapshot().await {
                Ok(translator) => Response::Status(DaemonStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_secs: ctx.start_time.elapsed().as_secs(),
                    translator,
                }),
                Err(e) => unavailable(e),
            },

            Request::Subscribe => Response::Subscribed,

            Request::EditText { text } => accepted(orchestrator.edit_text(text).await),
            Request::TranslateNow => accepted(orchestrator.translate_now().await),
            Request::SwapLanguages => accepted(orchestrator.swap_languages().await),
            Request::SetLanguages { source, target } => {
                info!(%source, %target, "languages changed via IPC");
                accepted(orchestrator.set_languages(source, target).await)
            }
            Request::SelectModel { model } => accepted(orchestrator.select_model(model).await),
            Request::RefreshModels => accepted(orchestrator.refresh_models().await),
            Request::Clear => accepted(orchestrator.clear().await),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

fn accepted(result: Result<(), OrchestratorClosed>) -> Response {
    match result {
        Ok(()) => Response::Accepted,
        Err(e) => unavailable(e),
    }
}

fn unavailable(e: OrchestratorClosed) -> Response {
    Response::Error {
        code: "unavailable".to_string(),
        message: e.to_string(),
    }
}

/// Push translator events to one subscribed client
async fn forward_events(
    mut event_rx: broadcast::Receiver<TranslatorEvent>,
    out_tx: mpsc::Sender<Outgoing>,
) {
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if out_tx.send(Outgoing::Notification(event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "subscriber lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Read one length-prefixed frame; `None` on clean EOF
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
pub(crate) async fn write_frame<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    msg: &T,
) -> Result<()> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
