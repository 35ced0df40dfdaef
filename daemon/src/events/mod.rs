//! Events published to the UI
//!
//! Every state change the front end needs to render goes out as a
//! [`TranslatorEvent`] on a broadcast channel. Results of superseded
//! requests never produce an event.

use serde::{Deserialize, Serialize};

/// Colour of the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Ready,
    Busy,
    Error,
}

/// Short status line plus indicator colour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    pub fn ready(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Ready,
        }
    }

    pub fn busy(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Busy,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Error,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ready("Ready")
    }
}

/// Events emitted by the daemon for the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranslatorEvent {
    /// Status line changed
    StatusChanged(Status),

    /// Source text was replaced by the daemon (gesture or swap)
    SourceTextChanged { text: String },

    /// Language pair changed
    LanguagesChanged { source: String, target: String },

    /// A request was issued and is now the active one
    TranslationStarted {
        id: u64,
        source_lang: String,
        target_lang: String,
        model: String,
    },

    /// The active request resolved
    TranslationCompleted { id: u64, text: String },

    /// The active request failed
    TranslationFailed { id: u64 },

    /// Target text was cleared without a new result
    TargetCleared,

    /// Model list refreshed
    ModelsUpdated {
        models: Vec<String>,
        selected: String,
    },

    /// Double-copy gesture delivered clipboard text
    GestureTriggered { chars: usize },

    /// The key monitor binary is missing; hotkeys are disabled
    MonitorUnavailable { path: String },

    /// The key monitor binary exists but could not be started
    MonitorSpawnFailed { path: String, reason: String },
}

impl std::fmt::Display for TranslatorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslatorEvent::StatusChanged(status) => write!(f, "STATUS ({})", status.text),
            TranslatorEvent::SourceTextChanged { text } => {
                write!(f, "SOURCE_TEXT_CHANGED ({} chars)", text.chars().count())
            }
            TranslatorEvent::LanguagesChanged { source, target } => {
                write!(f, "LANGUAGES_CHANGED ({} -> {})", source, target)
            }
            TranslatorEvent::TranslationStarted { id, .. } => {
                write!(f, "TRANSLATION_STARTED (#{})", id)
            }
            TranslatorEvent::TranslationCompleted { id, .. } => {
                write!(f, "TRANSLATION_COMPLETED (#{})", id)
            }
            TranslatorEvent::TranslationFailed { id } => write!(f, "TRANSLATION_FAILED (#{})", id),
            TranslatorEvent::TargetCleared => write!(f, "TARGET_CLEARED"),
            TranslatorEvent::ModelsUpdated { models, selected } => {
                write!(f, "MODELS_UPDATED ({} models, {})", models.len(), selected)
            }
            TranslatorEvent::GestureTriggered { chars } => {
                write!(f, "GESTURE_TRIGGERED ({} chars)", chars)
            }
            TranslatorEvent::MonitorUnavailable { path } => {
                write!(f, "MONITOR_UNAVAILABLE ({})", path)
            }
            TranslatorEvent::MonitorSpawnFailed { path, .. } => {
                write!(f, "MONITOR_SPAWN_FAILED ({})", path)
            }
        }
    }
}
