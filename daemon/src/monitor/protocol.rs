//! Monitor wire protocol
//!
//! The key monitor writes one token per line on stdout. Anything that is
//! not a recognised token is ignored by the reader; stderr is diagnostics.
//! Lines are trimmed before parsing, so `\r\n` endings and padding are fine.

use std::fmt;

use tokio::time::Instant;

/// Token written once the event tap is live
pub const STARTED: &str = "started";
/// Token written for every Cmd+C key-down
pub const GESTURE_KEY_DOWN: &str = "CMD_C";
/// Token written before exiting when the tap cannot be created
pub const TAP_FAILED: &str = "failed to create event tap";

/// A line the monitor can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorToken {
    Started,
    GestureKeyDown,
    TapFailed,
}

impl MonitorToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorToken::Started => STARTED,
            MonitorToken::GestureKeyDown => GESTURE_KEY_DOWN,
            MonitorToken::TapFailed => TAP_FAILED,
        }
    }

    /// Parse a single already-trimmed line
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            STARTED => Some(MonitorToken::Started),
            GESTURE_KEY_DOWN => Some(MonitorToken::GestureKeyDown),
            TAP_FAILED => Some(MonitorToken::TapFailed),
            _ => None,
        }
    }

    /// The key event a token stands for. `TapFailed` is diagnostic only.
    pub fn event_kind(self) -> Option<KeyEventKind> {
        match self {
            MonitorToken::Started => Some(KeyEventKind::MonitorStarted),
            MonitorToken::GestureKeyDown => Some(KeyEventKind::GestureKeyDown),
            MonitorToken::TapFailed => None,
        }
    }
}

impl fmt::Display for MonitorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of key event forwarded downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// The qualifying Cmd+C key-down
    GestureKeyDown,
    /// The monitor finished initialising
    MonitorStarted,
}

/// A typed monitor event stamped with its arrival time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub at: Instant,
}

impl KeyEvent {
    pub fn new(kind: KeyEventKind, at: Instant) -> Self {
        Self { kind, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for token in [
            MonitorToken::Started,
            MonitorToken::GestureKeyDown,
            MonitorToken::TapFailed,
        ] {
            assert_eq!(MonitorToken::parse(token.as_str()), Some(token));
        }
    }

    #[test]
    fn test_unknown_lines_are_ignored() {
        assert_eq!(MonitorToken::parse("cmd_c"), None);
        assert_eq!(MonitorToken::parse("CMD_V"), None);
        assert_eq!(MonitorToken::parse(""), None);
    }

    #[test]
    fn test_tokens_map_to_key_events() {
        assert_eq!(
            MonitorToken::Started.event_kind(),
            Some(KeyEventKind::MonitorStarted)
        );
        assert_eq!(
            MonitorToken::GestureKeyDown.event_kind(),
            Some(KeyEventKind::GestureKeyDown)
        );
    }

    #[test]
    fn test_failure_token_has_no_event() {
        assert_eq!(MonitorToken::parse(TAP_FAILED), Some(MonitorToken::TapFailed));
        assert_eq!(MonitorToken::TapFailed.event_kind(), None);
    }
}
