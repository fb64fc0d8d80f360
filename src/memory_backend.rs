//! In-memory [`Backend`] for tests and offline use.
//!
//! Holds chat history and the file listing in memory and answers requests
//! from a small script: what a chat reply streams, what an upload reports,
//! which calls fail or get refused. Events are emitted on the bus before the
//! acknowledging call returns, so a caller that pumps its subscription right
//! after a request sees them in order.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use assist_harness_core::events::{BackendEvent, UploadProgress};
use assist_harness_core::models::{Session, SessionId};

use crate::backend::{AssistantConfig, Backend, ChatRequest, EventBus};

/// Scripted behavior of one upload round.
#[derive(Debug, Clone)]
pub struct UploadScript {
    /// `(reported file, reported percent)` pairs, emitted in order.
    pub progress: Vec<(String, String)>,
    /// Completion payload. `None` holds the round open until cancelled.
    pub completion: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    history: Vec<Session>,
    files: Vec<PathBuf>,
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    refusing: HashSet<&'static str>,
    reply: Option<Vec<String>>,
    hold_stream: bool,
    stream_open: bool,
    upload: Option<UploadScript>,
    last_chat: Option<ChatRequest>,
    last_upload: Vec<PathBuf>,
    last_removed: Vec<PathBuf>,
    config: AssistantConfig,
}

pub struct InMemoryBackend {
    bus: EventBus,
    state: Mutex<State>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            bus: EventBus::new(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a call and fail it if a failure was scripted for `op`.
    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls.push(op);
        if state.failing.remove(op) {
            bail!("{op}: connection reset");
        }
        Ok(state)
    }

    pub fn with_history(self, history: Vec<Session>) -> Self {
        self.state().history = history;
        self
    }

    pub fn with_files(self, files: Vec<PathBuf>) -> Self {
        self.state().files = files;
        self
    }

    pub fn with_config(self, config: AssistantConfig) -> Self {
        self.state().config = config;
        self
    }

    /// Stream these deltas for every following chat request.
    pub fn reply_with<I, S>(&self, deltas: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().reply = Some(deltas.into_iter().map(Into::into).collect());
    }

    /// Keep chat streams open after their deltas; only `stop_chat` closes them.
    pub fn hold_streams(&self, hold: bool) {
        self.state().hold_stream = hold;
    }

    pub fn script_upload(&self, script: UploadScript) {
        self.state().upload = Some(script);
    }

    /// Make the next call to `op` fail with a transport error.
    pub fn fail_next(&self, op: &'static str) {
        self.state().failing.insert(op);
    }

    /// Make `op` answer `false` until [`accept`](Self::accept) is called.
    pub fn refuse(&self, op: &'static str) {
        self.state().refusing.insert(op);
    }

    pub fn accept(&self, op: &'static str) {
        self.state().refusing.remove(op);
    }

    /// Push an event as if the backend produced it unprompted.
    pub fn emit(&self, event: BackendEvent) -> usize {
        self.bus.emit(event)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn last_chat(&self) -> Option<ChatRequest> {
        self.state().last_chat.clone()
    }

    pub fn last_upload(&self) -> Vec<PathBuf> {
        self.state().last_upload.clone()
    }

    pub fn last_removed(&self) -> Vec<PathBuf> {
        self.state().last_removed.clone()
    }

    pub fn history(&self) -> Vec<Session> {
        self.state().history.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn connect(&self) -> Result<String> {
        self.enter("connect")?;
        Ok("Connected".to_string())
    }

    async fn fetch_config(&self) -> Result<AssistantConfig> {
        let state = self.enter("fetch_config")?;
        Ok(state.config.clone())
    }

    async fn send_chat(&self, request: ChatRequest) -> Result<()> {
        let mut state = self.enter("send_chat")?;
        let deltas = state
            .reply
            .clone()
            .unwrap_or_else(|| vec!["Echo: ".to_string(), request.prompt.clone()]);
        state.last_chat = Some(request);
        for delta in deltas {
            self.bus.emit(BackendEvent::NewMessage(delta));
        }
        if state.hold_stream {
            state.stream_open = true;
        } else {
            self.bus.emit(BackendEvent::StreamCompleted);
        }
        Ok(())
    }

    async fn stop_chat(&self) -> Result<()> {
        let mut state = self.enter("stop_chat")?;
        if state.stream_open {
            state.stream_open = false;
            self.bus.emit(BackendEvent::StreamCompleted);
        }
        Ok(())
    }

    async fn get_chat_history(&self) -> Result<Vec<Session>> {
        let state = self.enter("get_chat_history")?;
        Ok(state.history.clone())
    }

    async fn rename_session(&self, sid: SessionId, name: &str) -> Result<bool> {
        let mut state = self.enter("rename_session")?;
        if state.refusing.contains("rename_session") {
            return Ok(false);
        }
        if let Some(session) = state.history.iter_mut().find(|s| s.sid == sid) {
            session.name = name.to_string();
        }
        Ok(true)
    }

    async fn remove_session(&self, sid: SessionId) -> Result<bool> {
        let mut state = self.enter("remove_session")?;
        if state.refusing.contains("remove_session") {
            return Ok(false);
        }
        state.history.retain(|s| s.sid != sid);
        Ok(true)
    }

    async fn upload_files(&self, paths: &[PathBuf]) -> Result<()> {
        let mut state = self.enter("upload_files")?;
        state.last_upload = paths.to_vec();
        let script = state.upload.clone().unwrap_or_else(|| UploadScript {
            progress: paths
                .iter()
                .flat_map(|p| {
                    let file = p.display().to_string();
                    ["0", "50", "100"].map(|pct| (file.clone(), pct.to_string()))
                })
                .collect(),
            completion: Some(
                serde_json::to_string(
                    &paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                )
                .unwrap_or_default(),
            ),
        });
        for (file, percent) in script.progress {
            self.bus
                .emit(BackendEvent::UploadProgress(UploadProgress::new(file, percent)));
        }
        if let Some(payload) = script.completion {
            if !payload.contains("ERROR") {
                for p in paths {
                    if !state.files.contains(p) {
                        state.files.push(p.clone());
                    }
                }
            }
            self.bus.emit(BackendEvent::UploadCompleted(payload));
        }
        Ok(())
    }

    async fn stop_upload(&self) -> Result<()> {
        self.enter("stop_upload")?;
        Ok(())
    }

    async fn remove_files(&self, paths: &[PathBuf]) -> Result<bool> {
        let mut state = self.enter("remove_files")?;
        state.last_removed = paths.to_vec();
        if state.refusing.contains("remove_files") {
            return Ok(false);
        }
        state.files.retain(|f| !paths.contains(f));
        Ok(true)
    }

    async fn get_file_list(&self) -> Result<Vec<PathBuf>> {
        let state = self.enter("get_file_list")?;
        Ok(state.files.clone())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackendEvent> {
        self.bus.subscribe()
    }
}
