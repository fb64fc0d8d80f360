//! Core data models shared by the session store, the streaming aggregator,
//! and the ingestion catalog.
//!
//! Sessions and messages mirror the shape the backend serializes in its chat
//! history, so a history payload deserializes directly into [`Session`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Externally visible session identity.
pub type SessionId = u32;

/// Catalog-local identity of an ingested file.
pub type FileId = u64;

/// A persisted conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub sid: SessionId,
    #[serde(default)]
    pub name: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(sid: SessionId, date: DateTime<Utc>) -> Self {
        Self {
            sid,
            name: String::new(),
            date,
            messages: Vec::new(),
        }
    }

    /// Timestamp for the next message: wall-clock millis, bumped past the
    /// last message so ordering within the session stays strict.
    pub fn next_timestamp(&self, now: DateTime<Utc>) -> i64 {
        let now = now.timestamp_millis();
        match self.messages.last() {
            Some(last) if last.timestamp >= now => last.timestamp + 1,
            _ => now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role label used in the conversation history sent with a chat request.
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    #[serde(default)]
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub query_type: Option<String>,
    #[serde(default)]
    pub attached_files: Vec<String>,
    #[serde(default)]
    pub feedback: Option<FeedbackRecord>,
}

impl Message {
    pub fn user(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp,
            query_type: None,
            attached_files: Vec::new(),
            feedback: None,
        }
    }

    /// An empty assistant message awaiting a streamed reply.
    pub fn placeholder(timestamp: i64) -> Self {
        Self {
            sender: Sender::Assistant,
            text: String::new(),
            timestamp,
            query_type: None,
            attached_files: Vec::new(),
            feedback: None,
        }
    }

    pub fn with_query(mut self, query_type: Option<String>, attached_files: Vec<String>) -> Self {
        self.query_type = query_type;
        self.attached_files = attached_files;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

/// Name and containing directory of the document a feedback record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagFileRef {
    pub name: String,
    pub path: String,
}

/// Sentiment metadata attached to a message by the feedback reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub text: String,
    pub rag_file: RagFileRef,
    pub added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Uploading,
    Uploaded,
    Removing,
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FileStatus::Uploading => "Uploading",
            FileStatus::Uploaded => "Uploaded",
            FileStatus::Removing => "Removing",
            FileStatus::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// A file discovered on disk, before the catalog accepts it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCandidate {
    pub name: String,
    /// Containing directory.
    pub dir: PathBuf,
    pub size_bytes: u64,
    pub added: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl FileCandidate {
    pub fn full_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

/// A document tracked by the ingestion catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFile {
    pub id: FileId,
    pub name: String,
    pub extension: String,
    pub size_bytes: u64,
    pub status: FileStatus,
    pub progress: u8,
    /// Containing directory.
    pub path: PathBuf,
    pub added: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl IngestFile {
    pub fn full_path(&self) -> PathBuf {
        self.path.join(&self.name)
    }

    pub fn is_same_file(&self, name: &str, dir: &Path) -> bool {
        self.name == name && self.path == dir
    }

    /// Size in megabytes with two decimals, e.g. `"1.50 MB"`.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Extension of `name` without the dot, as written. Names with no dot
/// return the whole name, matching how the allow-list check treats them.
pub fn extension_of(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
