use assist_harness_core::models::SessionId;
use thiserror::Error;

/// Failures surfaced by [`Engine`](crate::engine::Engine) operations.
///
/// Rejections by the backend (a rename or removal it refused) and transport
/// failures are kept apart: the first leaves state untouched by design, the
/// second may interrupt an operation halfway and is cleaned up by the
/// in-flight tickets before it reaches the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("backend request `{op}` failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("backend refused `{op}`")]
    Rejected { op: &'static str },
    #[error("{0} already in progress")]
    Busy(&'static str),
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("no files selected")]
    NothingSelected,
}

impl EngineError {
    pub(crate) fn transport(op: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| EngineError::Transport { op, source }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
