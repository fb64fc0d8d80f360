//! Turns user-selected paths into ingestion candidates.
//!
//! Files are taken as given; directories are expanded to the files they
//! contain (direct children only, unless `ingest.recursive` is set).
//! Symlinks inside a directory are skipped, and only extensions on the
//! allow-list survive. De-duplication is the catalog's job.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use assist_harness_core::models::{extension_of, FileCandidate};

use crate::config::IngestConfig;

pub fn resolve_paths<P: AsRef<Path>>(paths: &[P], config: &IngestConfig) -> Vec<FileCandidate> {
    let mut candidates = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat submitted path; skipping");
                continue;
            }
        };

        if metadata.is_dir() {
            candidates.extend(expand_dir(&canonical_dir(path), config));
        } else if metadata.is_file() {
            let Some(name) = path.file_name() else {
                continue;
            };
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let path = canonical_dir(parent).join(name);
            if let Some(candidate) = accept_file(&path, &metadata, config) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Absolute, normalized form of a directory, so the same file reached
/// through different spellings de-duplicates. Falls back to the path as
/// given when it cannot be resolved.
fn canonical_dir(dir: &Path) -> PathBuf {
    match std::fs::canonicalize(dir) {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot canonicalize directory; using it as given");
            dir.to_path_buf()
        }
    }
}

/// Unreadable entries are skipped one by one; the rest of the directory
/// still contributes.
fn expand_dir(dir: &Path, config: &IngestConfig) -> Vec<FileCandidate> {
    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name();

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory entry; skipping");
                continue;
            }
        };
        // Symlinks report their own type here, so they fall out too.
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "cannot stat directory entry; skipping");
                continue;
            }
        };
        if let Some(candidate) = accept_file(entry.path(), &metadata, config) {
            found.push(candidate);
        }
    }
    found
}

fn accept_file(path: &Path, metadata: &std::fs::Metadata, config: &IngestConfig) -> Option<FileCandidate> {
    let name = path.file_name()?.to_string_lossy().to_string();
    if !config.allows(extension_of(&name)) {
        debug!(file = %name, "extension not allowed; skipping");
        return None;
    }
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    let modified = metadata.modified().map(to_utc).unwrap_or_else(|_| Utc::now());
    let added = metadata.accessed().map(to_utc).unwrap_or(modified);

    Some(FileCandidate {
        name,
        dir,
        size_bytes: metadata.len(),
        added,
        modified,
    })
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Build a candidate for a file the backend already lists. Files that no
/// longer exist locally still get an entry, with zero size.
pub fn listed_candidate(path: &Path) -> Option<FileCandidate> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let (size_bytes, added, modified) = match std::fs::metadata(path) {
        Ok(m) => {
            let modified = m.modified().map(to_utc).unwrap_or_else(|_| Utc::now());
            let added = m.accessed().map(to_utc).unwrap_or(modified);
            (m.len(), added, modified)
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "listed file not present locally");
            let now = Utc::now();
            (0, now, now)
        }
    };
    Some(FileCandidate {
        name,
        dir,
        size_bytes,
        added,
        modified,
    })
}
