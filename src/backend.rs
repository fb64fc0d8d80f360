//! The backend call surface.
//!
//! Everything the engine needs from the inference/ingestion service is
//! expressed as the [`Backend`] trait: request/response calls plus an
//! event subscription. The transport behind it (gRPC, IPC, an
//! in-process fake) is an implementation detail of each backend.
//!
//! Calls that start long-running work (`send_chat`, `upload_files`) only
//! acknowledge the request; the content and the terminal outcome arrive as
//! [`BackendEvent`]s on the channel returned by [`Backend::subscribe`].

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use assist_harness_core::events::BackendEvent;
use assist_harness_core::models::{Message, Session, SessionId};

/// One prior turn of the conversation, in the backend's wire casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Content")]
    pub content: String,
}

impl From<&Message> for HistoryTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.sender.role().to_string(),
            content: message.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Assistant the request is addressed to.
    pub name: String,
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    pub sid: SessionId,
    pub query_type: Option<String>,
    /// Attached files as a JSON array string, `None` when nothing is attached.
    pub attached_files: Option<String>,
}

/// A model known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub full_name: String,
    #[serde(default)]
    pub model_type: String,
}

/// Assistant configuration reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub download_endpoint: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Open the connection; returns a human-readable status.
    async fn connect(&self) -> Result<String>;

    async fn fetch_config(&self) -> Result<AssistantConfig>;

    /// Start a chat reply. Deltas and completion arrive as events.
    async fn send_chat(&self, request: ChatRequest) -> Result<()>;

    /// Ask the backend to stop the in-flight reply. It still emits
    /// `StreamCompleted` once it has stopped.
    async fn stop_chat(&self) -> Result<()>;

    async fn get_chat_history(&self) -> Result<Vec<Session>>;

    /// Returns whether the backend accepted the rename.
    async fn rename_session(&self, sid: SessionId, name: &str) -> Result<bool>;

    /// Returns whether the backend deleted the session.
    async fn remove_session(&self, sid: SessionId) -> Result<bool>;

    /// Start uploading a batch. Progress and completion arrive as events.
    async fn upload_files(&self, paths: &[PathBuf]) -> Result<()>;

    async fn stop_upload(&self) -> Result<()>;

    /// Returns whether the backend removed the files.
    async fn remove_files(&self, paths: &[PathBuf]) -> Result<bool>;

    /// Full paths of every document in the knowledge base.
    async fn get_file_list(&self) -> Result<Vec<PathBuf>>;

    /// A fresh receiver on the backend's event channel. It sees every
    /// event emitted after the call, none dropped.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackendEvent>;
}

/// Sending half of a backend's event channel.
///
/// Backends own one of these and hand out receivers from
/// [`Backend::subscribe`]. Each subscriber gets its own unbounded queue, so
/// a reply emitted faster than it is consumed arrives whole. Dropping a
/// receiver unsubscribes it.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<BackendEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<BackendEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<BackendEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers().push(tx);
        rx
    }

    /// Deliver to every live subscriber. Returns how many received it.
    pub fn emit(&self, event: BackendEvent) -> usize {
        let mut subscribers = self.subscribers();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().iter().filter(|tx| !tx.is_closed()).count()
    }
}
