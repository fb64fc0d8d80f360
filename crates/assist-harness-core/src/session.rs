//! The session store.
//!
//! Owns the ordered list of chat sessions and the current selection. Only
//! local state lives here; operations that need backend confirmation
//! (rename, removal) are split into a request made by the caller and a
//! `commit_*` applied once the backend agrees.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::ids::next_session_id;
use crate::models::{Message, Session, SessionId};

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    selected: Option<SessionId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut [Session] {
        &mut self.sessions
    }

    pub fn selected(&self) -> Option<SessionId> {
        self.selected
    }

    pub fn get(&self, sid: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.sid == sid)
    }

    fn get_mut(&mut self, sid: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.sid == sid)
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.selected.and_then(|sid| self.get(sid))
    }

    /// Replace the cached sessions with a history fetched from the backend.
    ///
    /// The selection survives only if the selected sid is still present.
    pub fn rehydrate(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
        if let Some(sid) = self.selected {
            if self.get(sid).is_none() {
                debug!(sid, "selected session missing after rehydrate; clearing selection");
                self.selected = None;
            }
        }
    }

    /// Allocate the smallest free sid, append a new empty session, and
    /// select it.
    pub fn create_session(&mut self, now: DateTime<Utc>) -> SessionId {
        let sid = next_session_id(self.sessions.iter().map(|s| s.sid));
        self.sessions.push(Session::new(sid, now));
        self.selected = Some(sid);
        debug!(sid, "created session");
        sid
    }

    /// Select a session, or `None` for the new-chat view. Unknown sids are
    /// refused and leave the selection unchanged.
    pub fn select_session(&mut self, sid: Option<SessionId>) -> bool {
        match sid {
            Some(sid) if self.get(sid).is_none() => {
                warn!(sid, "cannot select unknown session");
                false
            }
            _ => {
                self.selected = sid;
                true
            }
        }
    }

    /// Apply a rename the backend has already confirmed.
    pub fn commit_rename(&mut self, sid: SessionId, name: &str) -> bool {
        match self.get_mut(sid) {
            Some(session) => {
                session.name = name.to_string();
                true
            }
            None => {
                warn!(sid, "rename confirmed for a session no longer cached");
                false
            }
        }
    }

    /// Apply a removal the backend has already confirmed.
    pub fn commit_remove(&mut self, sid: SessionId) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.sid == sid)?;
        if self.selected == Some(sid) {
            self.selected = None;
        }
        Some(self.sessions.remove(index))
    }

    /// Append to the selected session. Without a selection this is a
    /// logged no-op.
    pub fn append_message(&mut self, message: Message) -> bool {
        let Some(sid) = self.selected else {
            warn!("append_message with no session selected; dropping message");
            return false;
        };
        self.append_to(sid, message)
    }

    /// Append to a specific session; a session removed in the meantime
    /// turns this into a logged no-op.
    pub fn append_to(&mut self, sid: SessionId, message: Message) -> bool {
        match self.get_mut(sid) {
            Some(session) => {
                session.messages.push(message);
                true
            }
            None => {
                warn!(sid, "append to missing session ignored");
                false
            }
        }
    }

    /// Append a user message and its empty assistant placeholder as one
    /// pair. Returns false if the session is gone.
    pub fn append_exchange(&mut self, sid: SessionId, mut user: Message, now: DateTime<Utc>) -> bool {
        let Some(session) = self.get_mut(sid) else {
            warn!(sid, "exchange for missing session ignored");
            return false;
        };
        user.timestamp = session.next_timestamp(now);
        let placeholder = Message::placeholder(user.timestamp + 1);
        session.messages.push(user);
        session.messages.push(placeholder);
        true
    }

    /// Overwrite text and timestamp of the selected session's last message.
    pub fn finalize_last_message(&mut self, text: &str, now: DateTime<Utc>) -> bool {
        let Some(sid) = self.selected else {
            warn!("finalize with no session selected");
            return false;
        };
        self.finalize_last_message_of(sid, text, now)
    }

    pub fn finalize_last_message_of(
        &mut self,
        sid: SessionId,
        text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(session) = self.get_mut(sid) else {
            warn!(sid, "finalize for missing session ignored");
            return false;
        };
        let len = session.messages.len();
        if len == 0 {
            warn!(sid, "finalize on a session without messages");
            return false;
        }
        let floor = if len >= 2 {
            session.messages[len - 2].timestamp + 1
        } else {
            i64::MIN
        };
        let last = &mut session.messages[len - 1];
        last.text = text.to_string();
        last.timestamp = now.timestamp_millis().max(floor);
        true
    }
}
