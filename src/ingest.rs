//! Document ingestion over the backend.
//!
//! [`IngestService`] admits local files into the catalog, drives upload
//! rounds, removes documents the backend confirms it dropped, and reads the
//! feedback documents found in the backend's listing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use globset::GlobSet;
use tracing::{debug, info, warn};

use assist_harness_core::catalog::IngestCatalog;
use assist_harness_core::events::{UploadOutcome, UploadProgress};
use assist_harness_core::feedback::FeedbackDocument;
use assist_harness_core::models::{FileId, FileStatus};

use crate::backend::Backend;
use crate::config::{FeedbackConfig, IngestConfig};
use crate::error::{EngineError, EngineResult};
use crate::progress::{UploadProgressEvent, UploadProgressReporter};
use crate::resolve::{listed_candidate, resolve_paths};

pub struct IngestService {
    backend: Arc<dyn Backend>,
    config: IngestConfig,
    feedback_globs: GlobSet,
    catalog: IngestCatalog,
    reporter: Box<dyn UploadProgressReporter>,
}

impl IngestService {
    pub fn new(
        backend: Arc<dyn Backend>,
        config: &IngestConfig,
        feedback: &FeedbackConfig,
        reporter: Box<dyn UploadProgressReporter>,
    ) -> Result<Self> {
        Ok(Self {
            backend,
            config: config.clone(),
            feedback_globs: feedback.globset()?,
            catalog: IngestCatalog::new(),
            reporter,
        })
    }

    pub fn catalog(&self) -> &IngestCatalog {
        &self.catalog
    }

    pub fn is_uploading(&self) -> bool {
        self.catalog.is_uploading()
    }

    /// Resolve paths into candidates and admit the new ones. Returns the ids
    /// of files added to the pending batch.
    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<FileId> {
        let admitted: Vec<FileId> = resolve_paths(paths, &self.config)
            .into_iter()
            .filter_map(|candidate| self.catalog.admit(candidate))
            .collect();
        debug!(admitted = admitted.len(), "paths admitted");
        admitted
    }

    /// Send the pending batch. Returns how many files the round carries, or
    /// 0 when nothing was pending.
    ///
    /// A request that fails to reach the backend fails the batch and lowers
    /// the `uploading` flag before the error is returned.
    pub async fn start_upload(&mut self) -> EngineResult<usize> {
        if self.catalog.is_uploading() {
            return Err(EngineError::Busy("upload"));
        }
        let Some(ticket) = self.catalog.begin_upload() else {
            return Ok(0);
        };
        let paths = ticket.paths().to_vec();
        self.backend
            .upload_files(&paths)
            .await
            .map_err(EngineError::transport("upload_files"))?;
        ticket.commit();
        info!(files = paths.len(), "upload started");
        Ok(paths.len())
    }

    pub fn on_progress(&mut self, progress: &UploadProgress) {
        for id in self.catalog.apply_progress(progress) {
            if let Some(file) = self.catalog.get(id) {
                self.reporter.report(UploadProgressEvent::File {
                    name: file.name.clone(),
                    percent: file.progress,
                });
            }
        }
    }

    pub fn on_completed(&mut self, payload: &str) {
        if !self.catalog.is_uploading() {
            debug!("completion arrived with no round in flight");
        }
        let round: Vec<PathBuf> = self.catalog.in_flight().to_vec();
        let outcome = UploadOutcome::from_payload(payload);
        self.catalog.apply_completion(&outcome);

        let (mut uploaded, mut failed) = (0u64, 0u64);
        for file in self.catalog.files() {
            if !round.contains(&file.full_path()) {
                continue;
            }
            match file.status {
                FileStatus::Uploaded => uploaded += 1,
                FileStatus::Failed => failed += 1,
                _ => {}
            }
        }
        if failed > 0 {
            warn!(failed, "upload round failed");
        }
        self.reporter
            .report(UploadProgressEvent::Finished { uploaded, failed });
    }

    /// Stop the running round and drop every file that is not `Uploaded`.
    /// If the stop request fails, nothing changes locally.
    pub async fn cancel(&mut self) -> EngineResult<usize> {
        self.backend
            .stop_upload()
            .await
            .map_err(EngineError::transport("stop_upload"))?;
        let dropped = self.catalog.cancel();
        info!(dropped, "upload cancelled");
        self.reporter.report(UploadProgressEvent::Cancelled {
            dropped: dropped as u64,
        });
        Ok(dropped)
    }

    pub fn select(&mut self, ids: &[FileId]) {
        self.catalog.select(ids);
    }

    /// Remove the selected files once the backend confirms. A refusal or a
    /// failed request restores their previous statuses.
    pub async fn remove_selected(&mut self) -> EngineResult<usize> {
        if self.catalog.selected().is_empty() {
            return Err(EngineError::NothingSelected);
        }
        let paths: Vec<PathBuf> = self
            .catalog
            .selected()
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .map(|f| f.full_path())
            .collect();
        let previous = self.catalog.begin_removal();

        match self.backend.remove_files(&paths).await {
            Ok(true) => {
                self.catalog.commit_removal(&previous);
                info!(files = previous.len(), "files removed");
                Ok(previous.len())
            }
            Ok(false) => {
                warn!("backend refused file removal");
                self.catalog.revert_removal(&previous);
                Err(EngineError::Rejected { op: "remove_files" })
            }
            Err(e) => {
                self.catalog.revert_removal(&previous);
                Err(EngineError::transport("remove_files")(e))
            }
        }
    }

    /// Mark everything the backend lists as `Uploaded` and read the listed
    /// feedback documents. Unreadable documents are skipped.
    pub async fn refresh_listing(&mut self) -> EngineResult<Vec<FeedbackDocument>> {
        let listed = self
            .backend
            .get_file_list()
            .await
            .map_err(EngineError::transport("get_file_list"))?;

        let mut docs = Vec::new();
        for path in listed {
            if let Some(candidate) = listed_candidate(&path) {
                self.catalog.admit_listed(candidate);
            }
            if !self.feedback_globs.is_match(&path) {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => docs.push(FeedbackDocument {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    dir: path
                        .parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    content,
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot read feedback document; skipping")
                }
            }
        }
        debug!(feedback_docs = docs.len(), "file listing refreshed");
        Ok(docs)
    }
}
