//! Translation request orchestrator
//!
//! Single task that serialises text edits, gesture text, language swaps
//! and request completions into one queue. Typing is debounced; gesture
//! text and explicit translate commands are issued at once. Issuing a
//! request cancels the previous one, and only a completion whose id matches
//! the active, non-cancelled request may change what the UI sees.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::{Status, TranslatorEvent};

use super::client::{TranslateError, TranslationService};
use super::prompt::build_prompt;

/// Initial values for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub source_lang: String,
    pub target_lang: String,
    pub model: String,
    pub debounce: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            model: config.model.clone(),
            debounce: config.timings.debounce,
        }
    }
}

/// One translation request
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub id: u64,
    pub source_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub model: String,
    pub issued_at: Instant,
    pub cancelled: bool,
}

/// Current orchestrator state as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source_text: String,
    pub target_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub model: String,
    pub models: Vec<String>,
    pub is_loading: bool,
    pub status: Status,
    pub active_request: Option<u64>,
}

#[derive(Debug)]
pub(crate) enum Command {
    EditText(String),
    GestureText(String),
    TranslateNow,
    SwapLanguages,
    SetLanguages { source: String, target: String },
    SelectModel(String),
    RefreshModels,
    Clear,
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Results posted back by tasks the orchestrator spawned
enum Internal {
    DebounceElapsed { seq: u64 },
    Completed {
        id: u64,
        result: Result<String, TranslateError>,
    },
    ModelsLoaded(Result<Vec<String>, TranslateError>),
}

#[derive(Debug, thiserror::Error)]
#[error("translation orchestrator is not running")]
pub struct OrchestratorClosed;

/// Cloneable handle for sending signals to the orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    command_tx: mpsc::Sender<Command>,
}

impl OrchestratorHandle {
    async fn send(&self, command: Command) -> Result<(), OrchestratorClosed> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| OrchestratorClosed)
    }

    /// The user typed; restarts the debounce timer
    pub async fn edit_text(&self, text: impl Into<String>) -> Result<(), OrchestratorClosed> {
        self.send(Command::EditText(text.into())).await
    }

    /// Text delivered by the double-copy gesture; translated immediately
    pub async fn gesture_text(&self, text: impl Into<String>) -> Result<(), OrchestratorClosed> {
        self.send(Command::GestureText(text.into())).await
    }

    pub async fn translate_now(&self) -> Result<(), OrchestratorClosed> {
        self.send(Command::TranslateNow).await
    }

    pub async fn swap_languages(&self) -> Result<(), OrchestratorClosed> {
        self.send(Command::SwapLanguages).await
    }

    pub async fn set_languages(
        &self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), OrchestratorClosed> {
        self.send(Command::SetLanguages {
            source: source.into(),
            target: target.into(),
        })
        .await
    }

    pub async fn select_model(&self, model: impl Into<String>) -> Result<(), OrchestratorClosed> {
        self.send(Command::SelectModel(model.into())).await
    }

    pub async fn refresh_models(&self) -> Result<(), OrchestratorClosed> {
        self.send(Command::RefreshModels).await
    }

    pub async fn clear(&self) -> Result<(), OrchestratorClosed> {
        self.send(Command::Clear).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, OrchestratorClosed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Snapshot(ack_tx)).await?;
        ack_rx.await.map_err(|_| OrchestratorClosed)
    }

    /// A handle whose commands land on the returned receiver
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::Receiver<Command>) {
        let (command_tx, command_rx) = mpsc::channel(32);
        (Self { command_tx }, command_rx)
    }
}

struct InFlight {
    request: TranslationRequest,
    task: JoinHandle<()>,
}

struct DebounceTimer {
    seq: u64,
    task: JoinHandle<()>,
}

pub struct Orchestrator {
    service: Arc<dyn TranslationService>,
    event_tx: broadcast::Sender<TranslatorEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    debounce: Duration,

    source_text: String,
    target_text: String,
    source_lang: String,
    target_lang: String,
    model: String,
    models: Vec<String>,
    is_loading: bool,
    status: Status,

    next_request_id: u64,
    next_debounce_seq: u64,
    active: Option<InFlight>,
    pending_debounce: Option<DebounceTimer>,
    models_task: Option<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        service: Arc<dyn TranslationService>,
        event_tx: broadcast::Sender<TranslatorEvent>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            service,
            event_tx,
            internal_tx,
            internal_rx,
            debounce: settings.debounce,
            source_text: String::new(),
            target_text: String::new(),
            source_lang: settings.source_lang,
            target_lang: settings.target_lang,
            model: settings.model,
            models: Vec::new(),
            is_loading: false,
            status: Status::default(),
            next_request_id: 0,
            next_debounce_seq: 0,
            active: None,
            pending_debounce: None,
            models_task: None,
        }
    }

    /// Start the orchestrator task
    pub fn spawn(self) -> (OrchestratorHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let task = tokio::spawn(self.run(command_rx));
        (OrchestratorHandle { command_tx }, task)
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        info!(
            model = %self.model,
            source = %self.source_lang,
            target = %self.target_lang,
            "translation orchestrator started"
        );

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
            }
        }

        self.cancel_debounce();
        self.cancel_active();
        if let Some(task) = self.models_task.take() {
            task.abort();
        }
        info!("translation orchestrator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::EditText(text) => self.on_edit(text),
            Command::GestureText(text) => self.on_gesture_text(text),
            Command::TranslateNow => {
                self.cancel_debounce();
                self.issue(self.source_text.clone());
            }
            Command::SwapLanguages => self.on_swap(),
            Command::SetLanguages { source, target } => {
                self.source_lang = source;
                self.target_lang = target;
                self.publish_languages();
            }
            Command::SelectModel(model) => self.on_select_model(model),
            Command::RefreshModels => self.refresh_models(),
            Command::Clear => self.on_clear(),
            Command::Snapshot(ack) => {
                let _ = ack.send(self.snapshot());
            }
        }
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::DebounceElapsed { seq } => self.on_debounce_elapsed(seq),
            Internal::Completed { id, result } => self.on_completed(id, result),
            Internal::ModelsLoaded(result) => self.on_models_loaded(result),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            source_text: self.source_text.clone(),
            target_text: self.target_text.clone(),
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            model: self.model.clone(),
            models: self.models.clone(),
            is_loading: self.is_loading,
            status: self.status.clone(),
            active_request: self.active.as_ref().map(|f| f.request.id),
        }
    }

    fn on_edit(&mut self, text: String) {
        self.source_text = text;
        self.cancel_debounce();

        if self.source_text.trim().is_empty() {
            if self.cancel_active() {
                self.is_loading = false;
                self.set_status(Status::default());
            }
            self.clear_target();
            return;
        }

        self.next_debounce_seq += 1;
        let seq = self.next_debounce_seq;
        let delay = self.debounce;
        let internal_tx = self.internal_tx.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            let _ = internal_tx.send(Internal::DebounceElapsed { seq });
        });
        self.pending_debounce = Some(DebounceTimer { seq, task });
    }

    fn on_debounce_elapsed(&mut self, seq: u64) {
        match &self.pending_debounce {
            Some(timer) if timer.seq == seq => {
                self.pending_debounce = None;
                self.issue(self.source_text.clone());
            }
            _ => debug!(seq, "ignoring superseded debounce timer"),
        }
    }

    fn on_gesture_text(&mut self, text: String) {
        self.cancel_debounce();
        self.source_text = text.clone();
        self.publish(TranslatorEvent::SourceTextChanged { text: text.clone() });
        self.issue(text);
    }

    fn on_swap(&mut self) {
        std::mem::swap(&mut self.source_lang, &mut self.target_lang);
        self.publish_languages();

        if self.target_text.is_empty() {
            return;
        }

        self.cancel_debounce();
        let new_source = std::mem::take(&mut self.target_text);
        self.source_text = new_source.clone();
        self.publish(TranslatorEvent::SourceTextChanged {
            text: new_source.clone(),
        });
        self.publish(TranslatorEvent::TargetCleared);
        self.issue(new_source);
    }

    fn on_select_model(&mut self, model: String) {
        let model = model.trim();
        if model.is_empty() {
            return;
        }
        self.model = model.to_string();
        info!(model = %self.model, "model selected");
        self.publish_models();
    }

    fn on_clear(&mut self) {
        self.cancel_debounce();
        if self.cancel_active() {
            self.is_loading = false;
        }
        self.source_text.clear();
        self.publish(TranslatorEvent::SourceTextChanged {
            text: String::new(),
        });
        self.clear_target();
        self.set_status(Status::default());
    }

    /// Issue a request for `text`, superseding any active one.
    ///
    /// Blank text is rejected here and never reaches the service.
    fn issue(&mut self, text: String) -> Option<u64> {
        if text.trim().is_empty() {
            debug!("rejecting blank translation request");
            return None;
        }

        self.cancel_active();

        self.next_request_id += 1;
        let request = TranslationRequest {
            id: self.next_request_id,
            source_text: text,
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            model: self.model.clone(),
            issued_at: Instant::now(),
            cancelled: false,
        };
        let id = request.id;

        self.is_loading = true;
        self.target_text.clear();
        self.set_status(Status::busy("Translating..."));
        self.publish(TranslatorEvent::TranslationStarted {
            id,
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            model: request.model.clone(),
        });
        info!(
            id,
            model = %request.model,
            from = %request.source_lang,
            to = %request.target_lang,
            chars = request.source_text.chars().count(),
            "translation request issued"
        );

        let prompt = build_prompt(
            &request.source_text,
            &request.source_lang,
            &request.target_lang,
        );
        let model = request.model.clone();
        let service = Arc::clone(&self.service);
        let internal_tx = self.internal_tx.clone();
        let task = tokio::spawn(async move {
            let result = service.generate(&model, &prompt).await;
            let _ = internal_tx.send(Internal::Completed { id, result });
        });

        self.active = Some(InFlight { request, task });
        Some(id)
    }

    fn on_completed(&mut self, id: u64, result: Result<String, TranslateError>) {
        let is_current = matches!(
            &self.active,
            Some(flight) if flight.request.id == id && !flight.request.cancelled
        );
        if !is_current {
            debug!(id, "discarding result of superseded request");
            return;
        }
        let Some(flight) = self.active.take() else {
            return;
        };

        self.is_loading = false;
        let elapsed_ms = flight.request.issued_at.elapsed().as_millis() as u64;

        let result = result.and_then(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(TranslateError::InvalidResponse)
            } else {
                Ok(text.to_string())
            }
        });

        match result {
            Ok(text) => {
                info!(id, elapsed_ms, "translation completed");
                self.target_text = text.clone();
                self.publish(TranslatorEvent::TranslationCompleted { id, text });
                self.set_status(Status::ready("Done"));
            }
            Err(e) => {
                warn!(id, elapsed_ms, error = %e, "translation failed");
                self.publish(TranslatorEvent::TranslationFailed { id });
                self.set_status(Status::error(e.status_text()));
            }
        }
    }

    fn refresh_models(&mut self) {
        if let Some(task) = self.models_task.take() {
            task.abort();
        }
        let service = Arc::clone(&self.service);
        let internal_tx = self.internal_tx.clone();
        self.models_task = Some(tokio::spawn(async move {
            let result = service.list_models().await;
            let _ = internal_tx.send(Internal::ModelsLoaded(result));
        }));
    }

    fn on_models_loaded(&mut self, result: Result<Vec<String>, TranslateError>) {
        self.models_task = None;
        match result {
            Ok(models) if !models.is_empty() => {
                if !models.contains(&self.model) {
                    info!(
                        previous = %self.model,
                        fallback = %models[0],
                        "selected model not installed, falling back"
                    );
                    self.model = models[0].clone();
                }
                self.models = models;
                self.publish_models();
                self.set_status(Status::ready("Ready"));
            }
            Ok(_) => {
                warn!("translation service reports no models");
                self.models.clear();
                self.publish_models();
                self.set_status(Status::error("No models found"));
            }
            Err(e) => {
                warn!(error = %e, "failed to load models");
                self.set_status(Status::error(e.status_text()));
            }
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(timer) = self.pending_debounce.take() {
            timer.task.abort();
        }
    }

    /// Mark the active request cancelled and stop its task.
    ///
    /// Returns whether there was one.
    fn cancel_active(&mut self) -> bool {
        let Some(mut flight) = self.active.take() else {
            return false;
        };
        flight.request.cancelled = true;
        flight.task.abort();
        debug!(id = flight.request.id, "translation request cancelled");
        true
    }

    fn clear_target(&mut self) {
        if !self.target_text.is_empty() {
            self.target_text.clear();
            self.publish(TranslatorEvent::TargetCleared);
        }
    }

    fn set_status(&mut self, status: Status) {
        if self.status != status {
            self.status = status.clone();
            self.publish(TranslatorEvent::StatusChanged(status));
        }
    }

    fn publish_languages(&self) {
        self.publish(TranslatorEvent::LanguagesChanged {
            source: self.source_lang.clone(),
            target: self.target_lang.clone(),
        });
    }

    fn publish_models(&self) {
        self.publish(TranslatorEvent::ModelsUpdated {
            models: self.models.clone(),
            selected: self.model.clone(),
        });
    }

    fn publish(&self, event: TranslatorEvent) {
        debug!(%event, "publishing event");
        // No subscribers is fine: the UI may not be connected yet
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::events::StatusKind;

    /// Scripted service: each generate call pops the next (delay, reply)
    struct FakeService {
        calls: Mutex<Vec<(String, String)>>,
        replies: Mutex<VecDeque<(Duration, Result<String, TranslateError>)>>,
        models: Mutex<Result<Vec<String>, TranslateError>>,
    }

    impl FakeService {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(VecDeque::new()),
                models: Mutex::new(Ok(Vec::new())),
            })
        }

        fn reply(&self, delay_ms: u64, result: Result<&str, TranslateError>) {
            self.replies
                .lock()
                .unwrap()
                .push_back((Duration::from_millis(delay_ms), result.map(str::to_string)));
        }

        fn set_models(&self, models: Result<Vec<&str>, TranslateError>) {
            *self.models.lock().unwrap() =
                models.map(|m| m.into_iter().map(str::to_string).collect());
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationService for FakeService {
        async fn generate(&self, model: &str, prompt: &str) -> Result<String, TranslateError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            let (delay, result) = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((Duration::ZERO, Ok("translated".to_string())));
            sleep(delay).await;
            result
        }

        async fn list_models(&self) -> Result<Vec<String>, TranslateError> {
            self.models.lock().unwrap().clone()
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            source_lang: "French".to_string(),
            target_lang: "English".to_string(),
            model: "gemma3:4b".to_string(),
            debounce: Duration::from_millis(500),
        }
    }

    fn start(
        service: Arc<FakeService>,
    ) -> (OrchestratorHandle, broadcast::Receiver<TranslatorEvent>) {
        let (event_tx, event_rx) = broadcast::channel(256);
        let (handle, _task) = Orchestrator::new(settings(), service, event_tx).spawn();
        (handle, event_rx)
    }

    fn drain(rx: &mut broadcast::Receiver<TranslatorEvent>) -> Vec<TranslatorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn completed_ids(events: &[TranslatorEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                TranslatorEvent::TranslationCompleted { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    async fn pause(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_issues_one_request_with_last_text() {
        let service = FakeService::new();
        let (handle, _events) = start(service.clone());

        for text in ["B", "Bo", "Bon", "Bonj", "Bonjour"] {
            handle.edit_text(text).await.unwrap();
            pause(120).await;
        }
        assert!(service.calls().is_empty());

        pause(600).await;
        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.ends_with("Text: Bonjour"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_edit_restarts_debounce() {
        let service = FakeService::new();
        let (handle, _events) = start(service.clone());

        handle.edit_text("Salut").await.unwrap();
        pause(400).await;
        handle.edit_text("Salut toi").await.unwrap();

        pause(450).await;
        assert!(service.calls().is_empty());

        pause(100).await;
        assert_eq!(service.calls().len(), 1);
        assert!(service.calls()[0].1.ends_with("Text: Salut toi"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_edits_never_reach_service() {
        let service = FakeService::new();
        let (handle, _events) = start(service.clone());

        handle.edit_text("").await.unwrap();
        pause(600).await;
        handle.edit_text("   \n\t").await.unwrap();
        pause(600).await;
        handle.translate_now().await.unwrap();
        handle.gesture_text("  ").await.unwrap();
        pause(600).await;

        assert!(service.calls().is_empty());
        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.active_request, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_edit_cancels_pending_and_active_work() {
        let service = FakeService::new();
        service.reply(1000, Ok("Hello"));
        let (handle, mut events) = start(service.clone());

        handle.gesture_text("Bonjour").await.unwrap();
        pause(100).await;
        handle.edit_text("").await.unwrap();
        pause(2000).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.target_text, "");
        assert!(!snapshot.is_loading);
        assert!(completed_ids(&drain(&mut events)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_bypasses_and_supersedes_debounce() {
        let service = FakeService::new();
        service.reply(50, Ok("Copied text"));
        let (handle, _events) = start(service.clone());

        handle.edit_text("half typed").await.unwrap();
        pause(100).await;
        handle.gesture_text("Texte copié").await.unwrap();
        pause(10).await;

        // Issued immediately, without waiting for a debounce
        assert_eq!(service.calls().len(), 1);
        assert!(service.calls()[0].1.ends_with("Text: Texte copié"));

        // The typing timer is gone
        pause(1000).await;
        assert_eq!(service.calls().len(), 1);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.source_text, "Texte copié");
        assert_eq!(snapshot.target_text, "Copied text");
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_request_wins_when_earlier_resolves_last() {
        let service = FakeService::new();
        service.reply(1000, Ok("from A"));
        service.reply(100, Ok("from B"));
        let (handle, mut events) = start(service.clone());

        handle.gesture_text("texte A").await.unwrap();
        pause(10).await;
        handle.gesture_text("texte B").await.unwrap();
        pause(2000).await;

        let events = drain(&mut events);
        assert_eq!(completed_ids(&events), vec![2]);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.target_text, "from B");
        assert!(!snapshot.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_request_wins_when_earlier_resolves_first() {
        let service = FakeService::new();
        service.reply(100, Ok("from A"));
        service.reply(1000, Ok("from B"));
        let (handle, mut events) = start(service.clone());

        handle.gesture_text("texte A").await.unwrap();
        pause(10).await;
        handle.gesture_text("texte B").await.unwrap();

        // A would have resolved by now; B is still loading
        pause(500).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.target_text, "");
        assert_eq!(snapshot.active_request, Some(2));

        pause(1000).await;
        assert_eq!(completed_ids(&drain(&mut events)), vec![2]);
        assert_eq!(handle.snapshot().await.unwrap().target_text, "from B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_failure_does_not_touch_status() {
        let service = FakeService::new();
        service.reply(100, Err(TranslateError::Service { status: 500 }));
        service.reply(300, Ok("fine"));
        let (handle, mut events) = start(service.clone());

        handle.gesture_text("one").await.unwrap();
        pause(10).await;
        handle.gesture_text("two").await.unwrap();
        pause(1000).await;

        let events = drain(&mut events);
        assert!(!events
            .iter()
            .any(|e| matches!(e, TranslatorEvent::TranslationFailed { .. })));
        assert!(!events.iter().any(|e| matches!(
            e,
            TranslatorEvent::StatusChanged(Status {
                kind: StatusKind::Error,
                ..
            })
        )));
        assert_eq!(handle.snapshot().await.unwrap().status, Status::ready("Done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_retranslates_previous_result() {
        let service = FakeService::new();
        service.reply(50, Ok("Hello"));
        service.reply(1000, Ok("Bonjour"));
        let (handle, _events) = start(service.clone());

        handle.edit_text("Bonjour").await.unwrap();
        pause(700).await;
        let before = handle.snapshot().await.unwrap();
        assert_eq!(before.target_text, "Hello");

        handle.swap_languages().await.unwrap();
        let during = handle.snapshot().await.unwrap();
        assert_eq!(during.source_lang, "English");
        assert_eq!(during.target_lang, "French");
        assert_eq!(during.source_text, "Hello");
        assert_eq!(during.target_text, "");
        assert!(during.is_loading);

        pause(10).await;
        let calls = service.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].1.contains("from English to French"));
        assert!(calls[1].1.ends_with("Text: Hello"));

        pause(1500).await;
        assert_eq!(handle.snapshot().await.unwrap().target_text, "Bonjour");
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_without_result_only_swaps_languages() {
        let service = FakeService::new();
        let (handle, _events) = start(service.clone());

        handle.swap_languages().await.unwrap();
        pause(600).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.source_lang, "English");
        assert_eq!(snapshot.target_lang, "French");
        assert!(service.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_short_status() {
        let service = FakeService::new();
        service.reply(10, Err(TranslateError::Unreachable("connection refused".into())));
        let (handle, mut events) = start(service.clone());

        handle.gesture_text("Bonjour").await.unwrap();
        pause(100).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.status, Status::error("Translation service unreachable"));
        assert!(drain(&mut events)
            .iter()
            .any(|e| *e == TranslatorEvent::TranslationFailed { id: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_response_is_a_failure() {
        let service = FakeService::new();
        service.reply(10, Ok("  \n "));
        let (handle, _events) = start(service.clone());

        handle.gesture_text("Bonjour").await.unwrap();
        pause(100).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.target_text, "");
        assert_eq!(snapshot.status, Status::error("Translation failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_selected_model_is_carried_on_request() {
        let service = FakeService::new();
        let (handle, _events) = start(service.clone());

        handle.select_model("llama3:8b").await.unwrap();
        handle.gesture_text("Bonjour").await.unwrap();
        pause(10).await;

        assert_eq!(service.calls()[0].0, "llama3:8b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_falls_back_to_first_model() {
        let service = FakeService::new();
        service.set_models(Ok(vec!["llama3:8b", "qwen2:7b"]));
        let (handle, mut events) = start(service.clone());

        handle.refresh_models().await.unwrap();
        pause(10).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.model, "llama3:8b");
        assert_eq!(snapshot.models, vec!["llama3:8b", "qwen2:7b"]);
        assert!(drain(&mut events).contains(&TranslatorEvent::ModelsUpdated {
            models: vec!["llama3:8b".to_string(), "qwen2:7b".to_string()],
            selected: "llama3:8b".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_keeps_installed_selection() {
        let service = FakeService::new();
        service.set_models(Ok(vec!["llama3:8b", "gemma3:4b"]));
        let (handle, _events) = start(service.clone());

        handle.refresh_models().await.unwrap();
        pause(10).await;

        assert_eq!(handle.snapshot().await.unwrap().model, "gemma3:4b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_with_no_models_reports_status() {
        let service = FakeService::new();
        service.set_models(Ok(Vec::new()));
        let (handle, _events) = start(service.clone());

        handle.refresh_models().await.unwrap();
        pause(10).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.models.is_empty());
        assert_eq!(snapshot.status, Status::error("No models found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_reports_status() {
        let service = FakeService::new();
        service.set_models(Err(TranslateError::Unreachable("refused".into())));
        let (handle, _events) = start(service.clone());

        handle.refresh_models().await.unwrap();
        pause(10).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status.kind, StatusKind::Error);
        assert_eq!(snapshot.model, "gemma3:4b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_everything_in_flight() {
        let service = FakeService::new();
        service.reply(500, Ok("Hello"));
        let (handle, mut events) = start(service.clone());

        handle.gesture_text("Bonjour").await.unwrap();
        pause(10).await;
        handle.edit_text("Bonjour!").await.unwrap();
        handle.clear().await.unwrap();
        pause(1500).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.source_text, "");
        assert_eq!(snapshot.target_text, "");
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.status, Status::default());
        assert_eq!(service.calls().len(), 1);
        assert!(completed_ids(&drain(&mut events)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_translate_now_skips_debounce() {
        let service = FakeService::new();
        let (handle, _events) = start(service.clone());

        handle.edit_text("Merci").await.unwrap();
        handle.translate_now().await.unwrap();
        pause(10).await;
        assert_eq!(service.calls().len(), 1);

        pause(1000).await;
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_ids_are_monotonic() {
        let service = FakeService::new();
        let (handle, mut events) = start(service.clone());

        for text in ["un", "deux", "trois"] {
            handle.gesture_text(text).await.unwrap();
            pause(10).await;
        }

        let started: Vec<u64> = drain(&mut events)
            .iter()
            .filter_map(|e| match e {
                TranslatorEvent::TranslationStarted { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![1, 2, 3]);
    }
}
