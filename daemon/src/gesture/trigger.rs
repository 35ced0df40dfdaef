//! Gesture to translation bridge
//!
//! A fired double tap means the user just copied something. After a short
//! settle delay (the pasteboard is updated asynchronously by the copying
//! app) the clipboard is read and non-blank text is handed to the
//! orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clipboard::ClipboardReader;
use crate::events::TranslatorEvent;
use crate::translate::OrchestratorHandle;

use super::detector::GestureFired;

pub async fn forward_gestures(
    mut fired_rx: mpsc::Receiver<GestureFired>,
    clipboard: Arc<dyn ClipboardReader>,
    settle_delay: Duration,
    orchestrator: OrchestratorHandle,
    event_tx: broadcast::Sender<TranslatorEvent>,
) {
    while let Some(fired) = fired_rx.recv().await {
        sleep(settle_delay).await;

        let Some(text) = clipboard.read_text().await else {
            debug!("clipboard empty after double copy");
            continue;
        };
        if text.trim().is_empty() {
            debug!("clipboard holds only whitespace, ignoring double copy");
            continue;
        }

        let chars = text.chars().count();
        info!(chars, delta_ms = fired.delta.as_millis() as u64, "translating clipboard text");
        let _ = event_tx.send(TranslatorEvent::GestureTriggered { chars });

        if orchestrator.gesture_text(text).await.is_err() {
            warn!("orchestrator stopped, dropping gesture");
            break;
        }
    }

    debug!("gesture forwarding stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use crate::translate::Command;

    struct FakeClipboard {
        text: Mutex<Option<String>>,
        reads: Mutex<Vec<Instant>>,
    }

    impl FakeClipboard {
        fn holding(text: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                text: Mutex::new(text.map(str::to_string)),
                reads: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ClipboardReader for FakeClipboard {
        async fn read_text(&self) -> Option<String> {
            self.reads.lock().unwrap().push(Instant::now());
            self.text.lock().unwrap().clone()
        }
    }

    fn fired_now() -> GestureFired {
        GestureFired {
            at: Instant::now(),
            delta: Duration::from_millis(200),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_forwarded_after_settle_delay() {
        let clipboard = FakeClipboard::holding(Some("Bonjour"));
        let (orchestrator, mut command_rx) = OrchestratorHandle::detached();
        let (event_tx, mut event_rx) = broadcast::channel(8);
        let (fired_tx, fired_rx) = mpsc::channel(4);

        let fired_at = Instant::now();
        fired_tx.send(fired_now()).await.unwrap();
        drop(fired_tx);

        forward_gestures(
            fired_rx,
            clipboard.clone(),
            Duration::from_millis(100),
            orchestrator,
            event_tx,
        )
        .await;

        let reads = clipboard.reads.lock().unwrap().clone();
        assert_eq!(reads.len(), 1);
        assert!(reads[0].duration_since(fired_at) >= Duration::from_millis(100));

        match command_rx.recv().await {
            Some(Command::GestureText(text)) => assert_eq!(text, "Bonjour"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(
            event_rx.recv().await.unwrap(),
            TranslatorEvent::GestureTriggered { chars: 7 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_clipboard_is_not_forwarded() {
        for content in [None, Some(""), Some("  \n")] {
            let clipboard = FakeClipboard::holding(content);
            let (orchestrator, mut command_rx) = OrchestratorHandle::detached();
            let (event_tx, _event_rx) = broadcast::channel(8);
            let (fired_tx, fired_rx) = mpsc::channel(4);

            fired_tx.send(fired_now()).await.unwrap();
            drop(fired_tx);

            forward_gestures(
                fired_rx,
                clipboard,
                Duration::from_millis(100),
                orchestrator,
                event_tx,
            )
            .await;

            assert!(command_rx.recv().await.is_none());
        }
    }
}
