//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::TranslatorEvent;
use crate::translate::Snapshot;

/// Largest frame accepted from a client
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to event notifications
    Subscribe,

    /// Source text edited by the user (debounced)
    EditText { text: String },

    /// Translate the current source text right away
    TranslateNow,

    SwapLanguages,

    SetLanguages { source: String, target: String },

    SelectModel { model: String },

    RefreshModels,

    /// Clear source and target text
    Clear,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Command queued for the orchestrator
    Accepted,

    /// Error response
    Error { code: String, message: String },
}

/// Frames written to a client: either a reply or a pushed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Outgoing {
    Response(Response),
    Notification(TranslatorEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Translator state
    pub translator: Snapshot,
}
