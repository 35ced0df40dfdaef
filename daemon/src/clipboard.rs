//! Clipboard text access
//!
//! The daemon only ever reads the clipboard, right after a double copy.

use async_trait::async_trait;
use tracing::{debug, warn};

/// Source of the text a gesture should translate
#[async_trait]
pub trait ClipboardReader: Send + Sync {
    /// Current clipboard text, or `None` if empty or unreadable
    async fn read_text(&self) -> Option<String>;
}

/// Reads the system clipboard through `arboard`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

/// Blocking read; `arboard` talks to the pasteboard synchronously
fn read_system_text() -> Option<String> {
    let mut clipboard = match arboard::Clipboard::new() {
        Ok(clipboard) => clipboard,
        Err(e) => {
            warn!(%e, "failed to open clipboard");
            return None;
        }
    };

    match clipboard.get_text() {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            debug!(%e, "clipboard holds no text");
            None
        }
    }
}

#[async_trait]
impl ClipboardReader for SystemClipboard {
    async fn read_text(&self) -> Option<String> {
        match tokio::task::spawn_blocking(read_system_text).await {
            Ok(text) => text,
            Err(e) => {
                warn!(?e, "clipboard read task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[tokio::test]
    async fn test_system_clipboard_is_a_reader() {
        let reader: Arc<dyn ClipboardReader> = Arc::new(SystemClipboard::new());
        // Whatever the host clipboard holds, the read completes without panicking
        let _ = reader.read_text().await;
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_missing_display_reads_as_empty() {
        if std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some() {
            return;
        }
        assert_eq!(SystemClipboard::new().read_text().await, None);
    }
}
