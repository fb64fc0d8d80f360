//! Feedback reconciliation.
//!
//! A feedback document is produced outside the client: it repeats a user
//! prompt and the assistant reply it received, then carries the user's
//! verdict. Reconciliation finds the exchange a document came from by
//! prefix-matching its content against user messages and attaches a
//! [`FeedbackRecord`] to the reply.
//!
//! The match is a heuristic. Prompts that are prefixes of each other can
//! attach to the wrong exchange; within a session the first matching user
//! message wins.

use tracing::debug;

use crate::models::{FeedbackKind, FeedbackRecord, RagFileRef, Sender, Session, SessionId};

/// Content and origin of one feedback document.
#[derive(Debug, Clone)]
pub struct FeedbackDocument {
    pub name: String,
    /// Containing directory.
    pub dir: String,
    pub content: String,
}

/// Where a record was attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub sid: SessionId,
    /// Index of the message that received the record.
    pub message_index: usize,
    pub kind: FeedbackKind,
}

/// Matching rules.
#[derive(Debug, Clone)]
pub struct ReconcileRules {
    /// Substring whose presence in the remainder marks positive feedback.
    pub positive_marker: String,
}

impl Default for ReconcileRules {
    fn default() -> Self {
        Self {
            positive_marker: "Positive".to_string(),
        }
    }
}

/// `content` from byte `offset`, moved forward to a char boundary.
fn tail_from(content: &str, offset: usize) -> &str {
    let mut start = offset.min(content.len());
    while !content.is_char_boundary(start) {
        start += 1;
    }
    &content[start..]
}

/// Text of the document left after the matched exchange.
///
/// The document lays the exchange out as `prompt + " " + reply`, then one
/// separator, and inserts one extra character per line break in the
/// exchange. The remainder starts after all of that.
fn remainder_after(content: &str, matched: &str) -> String {
    let line_breaks = matched.matches('\n').count();
    tail_from(content, matched.len() + 1 + line_breaks)
        .trim()
        .to_string()
}

/// Try one document against one session. On a match, attach the record and
/// report where it went.
pub fn reconcile_session(
    session: &mut Session,
    doc: &FeedbackDocument,
    rules: &ReconcileRules,
) -> Option<Attachment> {
    let index = session
        .messages
        .iter()
        .position(|m| {
            m.sender == Sender::User
                && !m.text.is_empty()
                && doc.content.starts_with(m.text.as_str())
        })?;

    let mut matched = session.messages[index].text.clone();
    if let Some(next) = session.messages.get(index + 1) {
        matched.push(' ');
        matched.push_str(&next.text);
    }
    let remainder = remainder_after(&doc.content, &matched);
    let kind = if remainder.contains(rules.positive_marker.as_str()) {
        FeedbackKind::Positive
    } else {
        FeedbackKind::Negative
    };

    let target = session.messages.get_mut(index + 1)?;
    target.feedback = Some(FeedbackRecord {
        kind,
        text: remainder,
        rag_file: RagFileRef {
            name: doc.name.clone(),
            path: doc.dir.clone(),
        },
        added: true,
    });
    debug!(sid = session.sid, message = index + 1, file = %doc.name, ?kind, "feedback attached");
    Some(Attachment {
        sid: session.sid,
        message_index: index + 1,
        kind,
    })
}

/// Run every document against every session.
pub fn reconcile(
    sessions: &mut [Session],
    docs: &[FeedbackDocument],
    rules: &ReconcileRules,
) -> Vec<Attachment> {
    let mut attached = Vec::new();
    for doc in docs {
        for session in sessions.iter_mut() {
            if let Some(a) = reconcile_session(session, doc, rules) {
                attached.push(a);
            }
        }
    }
    attached
}
