//! Chat sessions over a streaming backend.
//!
//! [`ChatService`] owns the session store, the streaming aggregator, and the
//! composer, and is the only thing that mutates them. A send appends the
//! user message and its placeholder before the request goes out; the reply
//! arrives later as events fed to [`ChatService::on_delta`] and
//! [`ChatService::on_completed`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use assist_harness_core::compose::Composer;
use assist_harness_core::models::{Message, Session, SessionId};
use assist_harness_core::session::SessionStore;
use assist_harness_core::stream::StreamAggregator;

use crate::backend::{Backend, ChatRequest, HistoryTurn};
use crate::config::ChatConfig;
use crate::error::{EngineError, EngineResult};

pub struct ChatService {
    backend: Arc<dyn Backend>,
    assistant: String,
    sessions: SessionStore,
    stream: StreamAggregator,
    composer: Composer,
}

impl ChatService {
    pub fn new(backend: Arc<dyn Backend>, config: &ChatConfig) -> Self {
        Self {
            backend,
            assistant: config.assistant.clone(),
            sessions: SessionStore::new(),
            stream: StreamAggregator::new(),
            composer: Composer::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(crate) fn sessions_mut(&mut self) -> &mut [Session] {
        self.sessions.sessions_mut()
    }

    pub fn stream(&self) -> &StreamAggregator {
        &self.stream
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    /// True while a reply is pending.
    pub fn thinking(&self) -> bool {
        self.stream.thinking()
    }

    /// Text to show for a message: the live accumulator for the message
    /// being streamed, the stored text otherwise.
    pub fn message_text(&self, sid: SessionId, index: usize) -> Option<&str> {
        let session = self.sessions.get(sid)?;
        let message = session.messages.get(index)?;
        let is_live = self.stream.target() == Some(sid) && index + 1 == session.messages.len();
        if is_live {
            Some(self.stream.accumulated())
        } else {
            Some(message.text.as_str())
        }
    }

    pub fn create_session(&mut self) -> SessionId {
        self.sessions.create_session(Utc::now())
    }

    /// Select a session, or `None` for a new chat.
    pub fn select_session(&mut self, sid: Option<SessionId>) -> EngineResult<()> {
        if self.sessions.select_session(sid) {
            Ok(())
        } else {
            Err(EngineError::UnknownSession(sid.unwrap_or_default()))
        }
    }

    /// Rename after the backend confirms. Returns `false` when the backend
    /// refused, in which case nothing changed locally.
    pub async fn rename_session(&mut self, sid: SessionId, name: &str) -> EngineResult<bool> {
        if self.sessions.get(sid).is_none() {
            return Err(EngineError::UnknownSession(sid));
        }
        let accepted = self
            .backend
            .rename_session(sid, name)
            .await
            .map_err(EngineError::transport("rename_session"))?;
        if !accepted {
            warn!(sid, "backend refused rename");
            return Ok(false);
        }
        self.sessions.commit_rename(sid, name);
        Ok(true)
    }

    /// Remove after the backend confirms. A refusal is an error and leaves
    /// the session in place.
    pub async fn remove_session(&mut self, sid: SessionId) -> EngineResult<()> {
        if self.sessions.get(sid).is_none() {
            return Err(EngineError::UnknownSession(sid));
        }
        let removed = self
            .backend
            .remove_session(sid)
            .await
            .map_err(EngineError::transport("remove_session"))?;
        if !removed {
            warn!(sid, "backend refused session removal");
            return Err(EngineError::Rejected {
                op: "remove_session",
            });
        }
        self.sessions.commit_remove(sid);
        info!(sid, "session removed");
        Ok(())
    }

    /// Reload sessions from the backend. Deferred (returns `false`) while a
    /// reply is streaming, so the placeholder is not overwritten.
    pub async fn refresh_history(&mut self) -> EngineResult<bool> {
        if self.stream.is_streaming() {
            debug!("history refresh deferred while streaming");
            return Ok(false);
        }
        let history = self
            .backend
            .get_chat_history()
            .await
            .map_err(EngineError::transport("get_chat_history"))?;
        debug!(sessions = history.len(), "chat history loaded");
        self.sessions.rehydrate(history);
        Ok(true)
    }

    /// Send the staged draft.
    ///
    /// Creates a session if none is selected, appends the user message and
    /// an empty placeholder, then issues the request. The draft is consumed
    /// only once the backend has accepted the request; a failed request
    /// leaves the placeholder empty, clears `thinking`, and keeps the draft.
    pub async fn send(&mut self) -> EngineResult<SessionId> {
        if self.stream.is_streaming() {
            return Err(EngineError::Busy("chat reply"));
        }
        let draft = self.composer.draft();
        if draft.prompt.trim().is_empty() {
            return Err(EngineError::EmptyPrompt);
        }

        let sid = match self.sessions.selected() {
            Some(sid) => sid,
            None => self.sessions.create_session(Utc::now()),
        };
        let history: Vec<HistoryTurn> = self
            .sessions
            .get(sid)
            .map(|s| s.messages.iter().map(HistoryTurn::from).collect())
            .unwrap_or_default();
        let attached_files = if draft.attachments.is_empty() {
            None
        } else {
            serde_json::to_string(&draft.attachments).ok()
        };

        let user = Message::user(draft.prompt.clone(), 0)
            .with_query(draft.query_type.clone(), draft.attachments.clone());
        if !self.sessions.append_exchange(sid, user, Utc::now()) {
            return Err(EngineError::UnknownSession(sid));
        }

        let request = ChatRequest {
            name: self.assistant.clone(),
            prompt: draft.prompt,
            history,
            sid,
            query_type: draft.query_type,
            attached_files,
        };

        let ticket = self.stream.begin(sid).ok_or(EngineError::Busy("chat reply"))?;
        self.backend
            .send_chat(request)
            .await
            .map_err(EngineError::transport("send_chat"))?;
        ticket.commit();

        self.composer.take();
        debug!(sid, "chat request sent");
        Ok(sid)
    }

    /// Ask the backend to stop the reply. The stream still ends through
    /// the completion event.
    pub async fn stop(&mut self) -> EngineResult<()> {
        if !self.stream.is_streaming() {
            debug!("stop requested with no reply in flight");
            return Ok(());
        }
        self.backend
            .stop_chat()
            .await
            .map_err(EngineError::transport("stop_chat"))
    }

    pub fn on_delta(&mut self, delta: &str) {
        self.stream.push_delta(delta);
    }

    /// Finalize the placeholder with the accumulated reply. Returns the
    /// session written to, or `None` if no stream was in flight.
    pub fn on_completed(&mut self) -> Option<SessionId> {
        let done = self.stream.complete()?;
        if self.sessions.selected() != Some(done.sid) {
            debug!(sid = done.sid, "reply finished for a session that is no longer selected");
        }
        self.sessions
            .finalize_last_message_of(done.sid, &done.text, Utc::now());
        Some(done.sid)
    }
}
