//! The ingestion catalog.
//!
//! Tracks every document the client knows about, the batch waiting to be
//! uploaded, and the batch currently in flight. All status and progress
//! changes go through this type; the native crate only decides *when* to
//! call them (on user action or on a backend event).
//!
//! # Lifecycle of a file
//!
//! ```text
//! admit ──▶ Uploading ──(progress 0..100)──▶ Uploaded ──▶ Removing ──▶ (dropped)
//!               │                                             │
//!               ├──▶ Failed          cancel drops it          └──▶ Uploaded (removal refused)
//!               └──▶ (dropped)
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::events::{UploadOutcome, UploadProgress};
use crate::models::{extension_of, FileCandidate, FileId, FileStatus, IngestFile};

#[derive(Debug)]
pub struct IngestCatalog {
    files: Vec<IngestFile>,
    /// Full paths admitted since the last upload round started.
    pending: Vec<PathBuf>,
    /// Full paths of the round currently being uploaded.
    in_flight: Vec<PathBuf>,
    selected: Vec<FileId>,
    uploading: bool,
    next_id: FileId,
}

impl Default for IngestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Last path component, accepting both `/` and `\` separators since the
/// backend may report paths in either form.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

impl IngestCatalog {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            pending: Vec::new(),
            in_flight: Vec::new(),
            selected: Vec::new(),
            uploading: false,
            next_id: 1,
        }
    }

    pub fn files(&self) -> &[IngestFile] {
        &self.files
    }

    pub fn get(&self, id: FileId) -> Option<&IngestFile> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn pending(&self) -> &[PathBuf] {
        &self.pending
    }

    pub fn in_flight(&self) -> &[PathBuf] {
        &self.in_flight
    }

    pub fn contains(&self, name: &str, dir: &Path) -> bool {
        self.files.iter().any(|f| f.is_same_file(name, dir))
    }

    fn push_file(&mut self, candidate: FileCandidate, status: FileStatus, progress: u8) -> FileId {
        let id = self.next_id;
        self.next_id += 1;
        let extension = extension_of(&candidate.name).to_lowercase();
        self.files.push(IngestFile {
            id,
            name: candidate.name,
            extension,
            size_bytes: candidate.size_bytes,
            status,
            progress,
            path: candidate.dir,
            added: candidate.added,
            modified: candidate.modified,
        });
        id
    }

    /// Accept a candidate into the catalog and the pending batch.
    ///
    /// A file already tracked under the same `(name, directory)` is skipped
    /// and `None` is returned.
    pub fn admit(&mut self, candidate: FileCandidate) -> Option<FileId> {
        if self.contains(&candidate.name, &candidate.dir) {
            debug!(name = %candidate.name, dir = %candidate.dir.display(), "duplicate candidate skipped");
            return None;
        }
        self.pending.push(candidate.full_path());
        Some(self.push_file(candidate, FileStatus::Uploading, 0))
    }

    /// Record a file the backend already holds, as reported by its listing.
    ///
    /// Files being removed or uploaded keep their status; the listing may
    /// predate the operation in flight.
    pub fn admit_listed(&mut self, candidate: FileCandidate) -> FileId {
        let full_path = candidate.full_path();
        let in_round = self.in_flight.contains(&full_path);
        if let Some(existing) = self
            .files
            .iter_mut()
            .find(|f| f.is_same_file(&candidate.name, &candidate.dir))
        {
            if existing.status == FileStatus::Removing || in_round {
                debug!(name = %existing.name, status = %existing.status, "listed file busy; status kept");
                return existing.id;
            }
            existing.status = FileStatus::Uploaded;
            existing.progress = 100;
            return existing.id;
        }
        self.push_file(candidate, FileStatus::Uploaded, 100)
    }

    /// Move the pending batch in flight and raise the `uploading` flag.
    ///
    /// Returns `None` when an upload is already running or nothing is
    /// pending. The returned ticket marks the batch `Failed` and lowers the
    /// flag if it is dropped without [`UploadTicket::commit`].
    pub fn begin_upload(&mut self) -> Option<UploadTicket<'_>> {
        if self.uploading {
            warn!("upload already in progress");
            return None;
        }
        if self.pending.is_empty() {
            debug!("nothing pending to upload");
            return None;
        }
        self.in_flight = std::mem::take(&mut self.pending);
        self.uploading = true;
        Some(UploadTicket {
            catalog: self,
            armed: true,
        })
    }

    fn in_flight_files_mut(&mut self) -> impl Iterator<Item = &mut IngestFile> {
        let in_flight = &self.in_flight;
        self.files
            .iter_mut()
            .filter(move |f| in_flight.contains(&f.full_path()))
    }

    /// Indices of in-flight files a reported path refers to. A path known to
    /// the catalog matches only that file, and only while it is in flight;
    /// any other path falls back to the round's files with the same name.
    fn round_matches(&self, reported: &str) -> Vec<usize> {
        let round: Vec<usize> = self
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| self.in_flight.contains(&f.full_path()))
            .map(|(i, _)| i)
            .collect();
        let reported_path = PathBuf::from(reported);
        if self.files.iter().any(|f| f.full_path() == reported_path) {
            return round
                .into_iter()
                .filter(|&i| self.files[i].full_path() == reported_path)
                .collect();
        }
        let name = file_name_of(reported);
        round
            .into_iter()
            .filter(|&i| self.files[i].name == name)
            .collect()
    }

    /// Apply a progress report. Returns the ids whose progress changed.
    ///
    /// Only files of the in-flight round are considered, matched by full
    /// path first and by file name otherwise. Non-numeric percentages,
    /// unknown files, files not `Uploading`, and values lower than the
    /// current progress are ignored.
    pub fn apply_progress(&mut self, progress: &UploadProgress) -> Vec<FileId> {
        let Some(percent) = progress.percent() else {
            debug!(value = %progress.current_file_progress, "non-numeric progress ignored");
            return Vec::new();
        };
        let reported = progress.current_file_uploading.as_str();

        let mut applied = Vec::new();
        for i in self.round_matches(reported) {
            let file = &mut self.files[i];
            if file.status != FileStatus::Uploading {
                continue;
            }
            if percent < file.progress {
                debug!(name = %file.name, current = file.progress, percent, "out-of-order progress rejected");
                continue;
            }
            file.progress = percent;
            applied.push(file.id);
        }
        if applied.is_empty() {
            debug!(file = reported, "progress applied to no file");
        }
        applied
    }

    /// Apply the terminal outcome of the in-flight batch and lower the
    /// `uploading` flag. Files outside the batch are never touched.
    pub fn apply_completion(&mut self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Uploaded(reported) => {
                for path in reported {
                    if self.round_matches(path).is_empty() {
                        debug!(file = %path, "completion names a file outside the round");
                    }
                }
                // Batch members the backend did not list were already held by it.
                for file in self.in_flight_files_mut() {
                    if file.status == FileStatus::Uploading {
                        file.status = FileStatus::Uploaded;
                        file.progress = 100;
                    }
                }
            }
            UploadOutcome::Failed => {
                for file in self.in_flight_files_mut() {
                    file.status = FileStatus::Failed;
                }
            }
            UploadOutcome::AlreadyUploaded => {
                for file in self.in_flight_files_mut() {
                    file.status = FileStatus::Uploaded;
                    file.progress = 100;
                }
            }
        }
        self.in_flight.clear();
        self.uploading = false;
    }

    /// Local half of a cancel: drop everything not yet `Uploaded`, forget the
    /// pending and in-flight batches, and lower the flag. Returns how many
    /// files were dropped.
    pub fn cancel(&mut self) -> usize {
        let before = self.files.len();
        self.files.retain(|f| f.status == FileStatus::Uploaded);
        self.pending.clear();
        self.in_flight.clear();
        self.uploading = false;
        let files = &self.files;
        self.selected.retain(|id| files.iter().any(|f| f.id == *id));
        before - self.files.len()
    }

    pub fn select(&mut self, ids: &[FileId]) {
        self.selected = ids
            .iter()
            .copied()
            .filter(|id| self.files.iter().any(|f| f.id == *id))
            .collect();
    }

    pub fn selected(&self) -> &[FileId] {
        &self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Mark the selection `Removing` and return what it was before, so a
    /// refused removal can be rolled back.
    pub fn begin_removal(&mut self) -> Vec<(FileId, FileStatus)> {
        let mut previous = Vec::new();
        for file in self.files.iter_mut() {
            if self.selected.contains(&file.id) {
                previous.push((file.id, file.status));
                file.status = FileStatus::Removing;
            }
        }
        previous
    }

    /// Drop files whose removal the backend confirmed and clear the selection.
    pub fn commit_removal(&mut self, removed: &[(FileId, FileStatus)]) {
        self.files
            .retain(|f| !removed.iter().any(|(id, _)| *id == f.id));
        self.selected.clear();
    }

    /// Restore statuses after the backend refused a removal.
    pub fn revert_removal(&mut self, previous: &[(FileId, FileStatus)]) {
        for (id, status) in previous {
            if let Some(file) = self.files.iter_mut().find(|f| f.id == *id) {
                file.status = *status;
            }
        }
    }
}

/// Scoped claim on an upload round.
///
/// Dropped without `commit` (the request never reached the backend), it
/// marks the round `Failed` and lowers the `uploading` flag.
#[must_use = "an uncommitted ticket fails the batch when dropped"]
pub struct UploadTicket<'a> {
    catalog: &'a mut IngestCatalog,
    armed: bool,
}

impl UploadTicket<'_> {
    /// Full paths of the round, for the upload request.
    pub fn paths(&self) -> &[PathBuf] {
        &self.catalog.in_flight
    }

    /// The request was accepted; the round now ends on a completion event
    /// or a cancel.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for UploadTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("upload request did not go through; failing the batch");
            self.catalog.apply_completion(&UploadOutcome::Failed);
        }
    }
}
