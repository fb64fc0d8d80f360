//! Composition staging: the input that has not been sent yet.

/// What a send consumes from the composer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub prompt: String,
    pub query_type: Option<String>,
    pub attachments: Vec<String>,
}

/// Holds the draft prompt, the active query intent, and staged attachments.
///
/// The intent and the attachments are set and cleared together: an intent
/// with no files to act on is never staged, nor are files without an intent.
#[derive(Debug, Default)]
pub struct Composer {
    prompt: String,
    query_type: Option<String>,
    attachments: Vec<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn query_type(&self) -> Option<&str> {
        self.query_type.as_deref()
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Replace the staged attachment set and its intent.
    pub fn stage_attachments<I, S>(&mut self, paths: I, intent: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let intent = intent.trim();
        if paths.is_empty() || intent.is_empty() {
            self.clear_attachments();
            return;
        }
        self.attachments = paths;
        self.query_type = Some(intent.to_string());
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
        self.query_type = None;
    }

    /// Snapshot of the current draft without clearing it.
    pub fn draft(&self) -> Draft {
        Draft {
            prompt: self.prompt.clone(),
            query_type: self.query_type.clone(),
            attachments: self.attachments.clone(),
        }
    }

    /// Take the whole draft, leaving the composer empty.
    pub fn take(&mut self) -> Draft {
        Draft {
            prompt: std::mem::take(&mut self.prompt),
            query_type: self.query_type.take(),
            attachments: std::mem::take(&mut self.attachments),
        }
    }
}
