//! Session identifier allocation.

use std::collections::HashSet;

use crate::models::SessionId;

/// Returns the smallest non-negative id not present in `live`.
///
/// Ids freed by removed sessions are handed out again, so a store that
/// creates, removes, and creates again gets `0` both times. An empty set
/// yields `0`.
pub fn next_session_id<I>(live: I) -> SessionId
where
    I: IntoIterator<Item = SessionId>,
{
    let taken: HashSet<SessionId> = live.into_iter().collect();
    (0..)
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(SessionId::MAX)
}
