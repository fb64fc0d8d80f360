//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or no file at all, via
//! [`Config::minimal`]) gives a working client. [`load_config`] validates
//! the values that the pipeline relies on.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Assistant name sent with every chat request.
    #[serde(default = "default_assistant")]
    pub assistant: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            assistant: default_assistant(),
        }
    }
}

fn default_assistant() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Descend into subdirectories when a directory is submitted.
    #[serde(default)]
    pub recursive: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            recursive: false,
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "docx", "txt", "md", "pptx", "xlsx", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl IngestConfig {
    /// Case-insensitive allow-list check on a bare extension.
    pub fn allows(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    /// Globs a listed file's full path must match to be read as a feedback
    /// document.
    #[serde(default = "default_feedback_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_positive_marker")]
    pub positive_marker: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            include_globs: default_feedback_globs(),
            positive_marker: default_positive_marker(),
        }
    }
}

fn default_feedback_globs() -> Vec<String> {
    vec!["**/feedback_docs/*feedback*".to_string()]
}

fn default_positive_marker() -> String {
    "Positive".to_string()
}

impl FeedbackConfig {
    pub fn globset(&self) -> Result<GlobSet> {
        build_globset(&self.include_globs)
    }
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&mut config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
/// A file that exists but does not parse is still an error.
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &mut Config) -> Result<()> {
    // Normalize extensions: ".PDF" -> "pdf"
    for ext in config.ingest.allowed_extensions.iter_mut() {
        *ext = ext.trim().trim_start_matches('.').to_lowercase();
    }
    config.ingest.allowed_extensions.retain(|e| !e.is_empty());
    if config.ingest.allowed_extensions.is_empty() {
        anyhow::bail!("ingest.allowed_extensions must name at least one extension");
    }

    if config.chat.assistant.trim().is_empty() {
        anyhow::bail!("chat.assistant must not be empty");
    }

    if config.feedback.positive_marker.is_empty() {
        anyhow::bail!("feedback.positive_marker must not be empty");
    }
    config
        .feedback
        .globset()
        .with_context(|| "feedback.include_globs contains an invalid glob")?;

    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
