//! The engine: one owner for all client state.
//!
//! [`Engine`] holds the chat and ingestion services, the event subscription,
//! and what the backend reported on connect. Backend events are applied by
//! the owner of the engine, either by draining what is queued
//! ([`Engine::pump`]) or by awaiting the next one ([`Engine::next_event`]),
//! so every state change happens under `&mut self`.
//!
//! The subscription is a lossless per-subscriber queue. [`Engine::attach`]
//! replaces it and [`Engine::detach`] drops it, so attaching twice never
//! delivers an event twice.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use assist_harness_core::events::BackendEvent;
use assist_harness_core::feedback::{reconcile, Attachment, ReconcileRules};
use assist_harness_core::models::SessionId;

use crate::backend::{AssistantConfig, Backend};
use crate::chat::ChatService;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::ingest::IngestService;
use crate::progress::UploadProgressReporter;

/// What a [`Engine::refresh`] did.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    /// `false` when the history reload was deferred by a streaming reply.
    pub history_reloaded: bool,
    pub feedback_documents: usize,
    pub attached: Vec<Attachment>,
}

pub struct Engine {
    backend: Arc<dyn Backend>,
    chat: ChatService,
    ingest: IngestService,
    rules: ReconcileRules,
    events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    status: Option<String>,
    assistant_config: Option<AssistantConfig>,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn Backend>,
        config: &Config,
        reporter: Box<dyn UploadProgressReporter>,
    ) -> Result<Self> {
        Ok(Self {
            chat: ChatService::new(backend.clone(), &config.chat),
            ingest: IngestService::new(
                backend.clone(),
                &config.ingest,
                &config.feedback,
                reporter,
            )?,
            rules: ReconcileRules {
                positive_marker: config.feedback.positive_marker.clone(),
            },
            backend,
            events: None,
            status: None,
            assistant_config: None,
        })
    }

    /// Subscribe to backend events, replacing any existing subscription.
    pub fn attach(&mut self) {
        if self.events.is_some() {
            debug!("replacing existing event subscription");
        }
        self.events = Some(self.backend.subscribe());
    }

    pub fn detach(&mut self) {
        self.events = None;
    }

    pub fn is_attached(&self) -> bool {
        self.events.is_some()
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ChatService {
        &mut self.chat
    }

    pub fn ingest(&self) -> &IngestService {
        &self.ingest
    }

    pub fn ingest_mut(&mut self) -> &mut IngestService {
        &mut self.ingest
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn assistant_config(&self) -> Option<&AssistantConfig> {
        self.assistant_config.as_ref()
    }

    /// Connect, then fetch the assistant configuration.
    pub async fn connect(&mut self) -> EngineResult<&str> {
        let status = self
            .backend
            .connect()
            .await
            .map_err(EngineError::transport("connect"))?;
        info!(status = %status, "backend connected");
        let config = self
            .backend
            .fetch_config()
            .await
            .map_err(EngineError::transport("fetch_config"))?;
        debug!(models = config.models.len(), "assistant config loaded");
        self.assistant_config = Some(config);
        Ok(self.status.insert(status).as_str())
    }

    /// Route one event to the service that owns it.
    pub fn apply(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::NewMessage(delta) => self.chat.on_delta(&delta),
            BackendEvent::StreamCompleted => {
                if self.chat.on_completed().is_none() {
                    debug!("stream completion with no reply in flight");
                }
            }
            BackendEvent::UploadProgress(progress) => self.ingest.on_progress(&progress),
            BackendEvent::UploadCompleted(payload) => self.ingest.on_completed(&payload),
        }
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(rx) = self.events.as_mut() else {
                return applied;
            };
            match rx.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    warn!("backend event channel closed");
                    self.events = None;
                    return applied;
                }
            }
        }
    }

    /// Wait for the next event and apply it. Returns `false` when there is
    /// no subscription or the channel has closed.
    pub async fn next_event(&mut self) -> bool {
        let Some(rx) = self.events.as_mut() else {
            return false;
        };
        match rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => {
                warn!("backend event channel closed");
                self.events = None;
                false
            }
        }
    }

    /// Send the draft and wait until the reply has been finalized.
    pub async fn send_and_wait(&mut self) -> EngineResult<SessionId> {
        let sid = self.chat.send().await?;
        while self.chat.stream().is_streaming() {
            if !self.next_event().await {
                break;
            }
        }
        Ok(sid)
    }

    /// Upload the pending batch and wait for its outcome. A backend that
    /// holds the round open keeps this waiting; use
    /// [`IngestService::start_upload`] and [`Engine::pump`] to stay
    /// responsive instead.
    pub async fn upload(&mut self) -> EngineResult<usize> {
        let files = self.ingest.start_upload().await?;
        while self.ingest.is_uploading() {
            if !self.next_event().await {
                break;
            }
        }
        Ok(files)
    }

    /// Reload history and the file listing, then attach feedback from the
    /// listed feedback documents to the reloaded sessions.
    pub async fn refresh(&mut self) -> EngineResult<RefreshSummary> {
        let history_reloaded = self.chat.refresh_history().await?;
        let docs = self.ingest.refresh_listing().await?;
        let attached = reconcile(self.chat.sessions_mut(), &docs, &self.rules);
        if !attached.is_empty() {
            info!(attached = attached.len(), "feedback reconciled");
        }
        Ok(RefreshSummary {
            history_reloaded,
            feedback_documents: docs.len(),
            attached,
        })
    }
}
