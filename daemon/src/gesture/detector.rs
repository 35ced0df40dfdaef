//! Double-tap detector
//!
//! Two-state machine over gesture key-downs from the supervisor. Two
//! key-downs strictly closer than the window fire once; a slower second
//! key-down re-arms with its own timestamp. Nothing happens between
//! events: the window is only evaluated when the next key-down arrives.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::TranslatorEvent;
use crate::monitor::{KeyEvent, KeyEventKind, SupervisorEvent};

/// The two detector states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    /// Waiting for a first key-down
    #[default]
    Idle,
    /// One key-down seen at `since`
    Armed { since: Instant },
}

impl std::fmt::Display for GestureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GestureState::Idle => write!(f, "Idle"),
            GestureState::Armed { .. } => write!(f, "Armed"),
        }
    }
}

/// Signal emitted for a recognised double tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureFired {
    /// Arrival time of the second key-down
    pub at: Instant,
    /// Gap between the two key-downs
    pub delta: Duration,
}

pub struct DoubleTapDetector {
    state: GestureState,
    window: Duration,
}

impl DoubleTapDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            state: GestureState::Idle,
            window,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Feed one key event, returning a signal if it completes a double tap
    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<GestureFired> {
        if event.kind != KeyEventKind::GestureKeyDown {
            return None;
        }

        match self.state {
            GestureState::Idle => {
                self.state = GestureState::Armed { since: event.at };
                None
            }
            GestureState::Armed { since } => {
                let delta = event.at.saturating_duration_since(since);
                debug!(delta_ms = delta.as_millis() as u64, "gesture key down while armed");

                if delta < self.window {
                    self.state = GestureState::Idle;
                    Some(GestureFired {
                        at: event.at,
                        delta,
                    })
                } else {
                    // Too slow: this key-down becomes the new first tap
                    self.state = GestureState::Armed { since: event.at };
                    None
                }
            }
        }
    }

    /// Consume supervisor events until the channel closes.
    ///
    /// Monitor spawn failures are passed on to the UI through `event_tx`.
    pub async fn run(
        &mut self,
        mut event_rx: mpsc::Receiver<SupervisorEvent>,
        fired_tx: mpsc::Sender<GestureFired>,
        event_tx: broadcast::Sender<TranslatorEvent>,
    ) {
        info!(window_ms = self.window.as_millis() as u64, "gesture detector started");

        while let Some(event) = event_rx.recv().await {
            match event {
                SupervisorEvent::Key(key) => {
                    if key.kind == KeyEventKind::MonitorStarted {
                        info!("native key monitor started");
                    }
                    if let Some(fired) = self.handle_key(&key) {
                        info!(delta_ms = fired.delta.as_millis() as u64, "double copy detected");
                        if fired_tx.send(fired).await.is_err() {
                            warn!("gesture receiver closed");
                            break;
                        }
                    }
                }
                SupervisorEvent::Spawned { pid, .. } => debug!(?pid, "monitor spawned"),
                SupervisorEvent::Exited { code, .. } => debug!(?code, "monitor exited"),
                SupervisorEvent::SpawnFailed { path, reason } => {
                    warn!(path = %path.display(), %reason, "monitor unavailable, hotkey disabled");
                    let _ = event_tx.send(TranslatorEvent::MonitorSpawnFailed {
                        path: path.display().to_string(),
                        reason,
                    });
                }
            }
        }

        info!("gesture detector stopped");
    }
}
