//! Events pushed by the backend over the shared event channel.

use serde::{Deserialize, Serialize};

/// Marker the backend puts in an upload completion payload when the batch
/// failed.
pub const UPLOAD_ERROR_MARKER: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// A text delta for the in-flight chat reply.
    NewMessage(String),
    /// The chat reply finished, naturally or after a stop request.
    StreamCompleted,
    UploadProgress(UploadProgress),
    /// Raw completion payload of an upload batch; see [`UploadOutcome`].
    UploadCompleted(String),
}

impl BackendEvent {
    /// Channel name the event travels on.
    pub fn name(&self) -> &'static str {
        match self {
            BackendEvent::NewMessage(_) => "new_message",
            BackendEvent::StreamCompleted => "stream-completed",
            BackendEvent::UploadProgress(_) => "upload-progress",
            BackendEvent::UploadCompleted(_) => "upload-completed",
        }
    }
}

/// Progress report for the file currently being uploaded.
///
/// `current_file_progress` is whatever the backend sent; it only counts as
/// progress when it parses as a non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    #[serde(default)]
    pub files_uploaded: String,
    pub current_file_uploading: String,
    pub current_file_progress: String,
}

impl UploadProgress {
    pub fn new(file: impl Into<String>, progress: impl Into<String>) -> Self {
        Self {
            files_uploaded: String::new(),
            current_file_uploading: file.into(),
            current_file_progress: progress.into(),
        }
    }

    /// Percent value, if the payload carries a valid one. Values above 100
    /// are clamped.
    pub fn percent(&self) -> Option<u8> {
        self.current_file_progress
            .trim()
            .parse::<u64>()
            .ok()
            .map(|p| p.min(100) as u8)
    }
}

/// Interpretation of an upload completion payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Files the backend reports as newly uploaded.
    Uploaded(Vec<String>),
    /// The batch failed.
    Failed,
    /// Nothing new was uploaded: everything was already in the knowledge base.
    AlreadyUploaded,
}

impl UploadOutcome {
    pub fn from_payload(payload: &str) -> Self {
        let trimmed = payload.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            return UploadOutcome::AlreadyUploaded;
        }
        if trimmed.contains(UPLOAD_ERROR_MARKER) {
            return UploadOutcome::Failed;
        }
        match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(files) if files.is_empty() => UploadOutcome::AlreadyUploaded,
            Ok(files) => UploadOutcome::Uploaded(files),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable upload completion payload; treating batch as failed");
                UploadOutcome::Failed
            }
        }
    }
}
