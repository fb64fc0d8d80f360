//! Upload progress reporting.
//!
//! The ingestion service reports what the backend says about an upload
//! round: per-file percentages as they are applied, and a summary when the
//! round ends. Reports go to **stderr** so stdout stays parseable.

use std::io::Write;

/// A single progress event for an upload round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadProgressEvent {
    /// A file's progress moved forward.
    File { name: String, percent: u8 },
    /// The round reached a terminal outcome.
    Finished { uploaded: u64, failed: u64 },
    /// The round was cancelled; `dropped` files left the catalog.
    Cancelled { dropped: u64 },
}

/// Receives upload progress. Implementations write to stderr (human or JSON).
pub trait UploadProgressReporter: Send + Sync {
    fn report(&self, event: UploadProgressEvent);
}

/// Human-friendly progress on stderr: "upload report.pdf  40%".
pub struct StderrProgress;

impl UploadProgressReporter for StderrProgress {
    fn report(&self, event: UploadProgressEvent) {
        let line = match &event {
            UploadProgressEvent::File { name, percent } => {
                format!("upload {}  {:>3}%  {}\n", name, percent, bar(*percent))
            }
            UploadProgressEvent::Finished { uploaded, failed } => {
                format!(
                    "upload finished  {} uploaded, {} failed\n",
                    format_number(*uploaded),
                    format_number(*failed)
                )
            }
            UploadProgressEvent::Cancelled { dropped } => {
                format!("upload cancelled  {} files dropped\n", format_number(*dropped))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl UploadProgressReporter for JsonProgress {
    fn report(&self, event: UploadProgressEvent) {
        let obj = match &event {
            UploadProgressEvent::File { name, percent } => serde_json::json!({
                "event": "progress",
                "file": name,
                "percent": percent
            }),
            UploadProgressEvent::Finished { uploaded, failed } => serde_json::json!({
                "event": "finished",
                "uploaded": uploaded,
                "failed": failed
            }),
            UploadProgressEvent::Cancelled { dropped } => serde_json::json!({
                "event": "cancelled",
                "dropped": dropped
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl UploadProgressReporter for NoProgress {
    fn report(&self, _event: UploadProgressEvent) {}
}

fn bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize) / 5;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled))
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn UploadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
