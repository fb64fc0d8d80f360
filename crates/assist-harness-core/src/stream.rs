//! Streaming response aggregation.
//!
//! The aggregator is a two-state machine:
//!
//! ```text
//!            begin()                 complete()
//!   Idle ─────────────▶ Streaming ─────────────▶ Idle
//!                         │  ▲
//!                         └──┘ push_delta()
//! ```
//!
//! Deltas are concatenated into an accumulator; the placeholder message in
//! the session store is only written once, when the completion event
//! arrives. A stop request does not touch the accumulator: the backend
//! answers a stop with the same completion event, so there is one finalize
//! path.

use tracing::{debug, warn};

use crate::models::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming { sid: SessionId },
}

/// A finished stream, ready to be written into the target session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedStream {
    pub sid: SessionId,
    pub text: String,
}

#[derive(Debug)]
pub struct StreamAggregator {
    state: StreamState,
    accumulator: String,
    thinking: bool,
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            accumulator: String::new(),
            thinking: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, StreamState::Streaming { .. })
    }

    /// True from `begin` until the stream completes or is abandoned.
    pub fn thinking(&self) -> bool {
        self.thinking
    }

    /// Text received so far for the in-flight reply.
    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    /// True once the first non-empty delta has arrived.
    pub fn has_output(&self) -> bool {
        self.is_streaming() && !self.accumulator.is_empty()
    }

    /// Session the in-flight reply belongs to.
    pub fn target(&self) -> Option<SessionId> {
        match self.state {
            StreamState::Streaming { sid } => Some(sid),
            StreamState::Idle => None,
        }
    }

    /// Enter `Streaming` for `sid` and return a ticket that rolls the
    /// aggregator back to `Idle` unless [`StreamTicket::commit`] is called.
    ///
    /// Returns `None` if a stream is already in flight.
    pub fn begin(&mut self, sid: SessionId) -> Option<StreamTicket<'_>> {
        if self.is_streaming() {
            warn!(sid, "stream already in flight; refusing to begin another");
            return None;
        }
        self.state = StreamState::Streaming { sid };
        self.accumulator.clear();
        self.thinking = true;
        debug!(sid, "stream started");
        Some(StreamTicket {
            aggregator: self,
            armed: true,
        })
    }

    /// Append a delta. Ignored while idle.
    pub fn push_delta(&mut self, delta: &str) -> bool {
        if !self.is_streaming() {
            debug!("delta received while idle; ignoring");
            return false;
        }
        self.accumulator.push_str(delta);
        true
    }

    /// Leave `Streaming`, handing back the accumulated text. A second call
    /// (or a call while idle) returns `None`.
    pub fn complete(&mut self) -> Option<CompletedStream> {
        let sid = self.target()?;
        self.state = StreamState::Idle;
        self.thinking = false;
        let text = std::mem::take(&mut self.accumulator);
        debug!(sid, len = text.len(), "stream completed");
        Some(CompletedStream { sid, text })
    }

    /// Drop an in-flight stream without producing a result.
    pub fn abort(&mut self) {
        if let Some(sid) = self.target() {
            debug!(sid, "stream aborted");
        }
        self.state = StreamState::Idle;
        self.thinking = false;
        self.accumulator.clear();
    }
}

/// Scoped claim on a freshly started stream.
///
/// Dropping the ticket without committing aborts the stream, so every exit
/// path of a failed send clears `thinking`.
#[must_use = "an uncommitted ticket aborts the stream when dropped"]
pub struct StreamTicket<'a> {
    aggregator: &'a mut StreamAggregator,
    armed: bool,
}

impl StreamTicket<'_> {
    /// Keep the stream running past the ticket's scope.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for StreamTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.aggregator.abort();
        }
    }
}
