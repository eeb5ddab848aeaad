//! File upload coordinator.
//!
//! Tracks every file handed to [`UploadCoordinator::handle_files`] through
//! `Pending → Uploading → Complete | Failed`, publishing progress on the
//! event bus. Files that break the configured type or size rules fail
//! immediately without an API call.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use docrepo_core::format::format_file_size;
use docrepo_core::{
    Document, DocumentApi, DocumentId, Error, EventBus, MetadataMap, RepositoryConfig, RepositoryEvent,
    UploadFile,
};

use crate::error_handling::{error_detail, ErrorHandler, OperationKind, ReportOptions};
use crate::lock;
use crate::notifications::NotificationService;

/// Upload state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Pending,
    Uploading,
    Complete,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// One row of the upload feedback panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadEntry {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: u64,
    /// 0..=100
    pub progress: u8,
    pub state: UploadState,
    pub error: Option<String>,
    pub document_id: Option<DocumentId>,
}

#[derive(Default)]
struct Panel {
    entries: Vec<UploadEntry>,
    visible: bool,
}

/// Accepts files and drives them through the upload API.
pub struct UploadCoordinator {
    api: Arc<dyn DocumentApi>,
    config: RepositoryConfig,
    notices: NotificationService,
    errors: Arc<ErrorHandler>,
    bus: Arc<EventBus>,
    panel: Mutex<Panel>,
}

impl UploadCoordinator {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        config: RepositoryConfig,
        notices: NotificationService,
        errors: Arc<ErrorHandler>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            api,
            config,
            notices,
            errors,
            bus,
            panel: Mutex::new(Panel::default()),
        }
    }

    /// Upload a batch of files, returning the documents that were created.
    ///
    /// Accepted files upload concurrently; one failure does not affect the
    /// others. `initial_metadata` is sent with every file.
    pub async fn handle_files(
        &self,
        files: Vec<UploadFile>,
        initial_metadata: Option<MetadataMap>,
    ) -> Vec<Document> {
        if files.is_empty() {
            return Vec::new();
        }
        let started = Instant::now();

        let mut accepted = Vec::with_capacity(files.len());
        {
            let mut panel = lock(&self.panel);
            panel.visible = true;
            for file in files {
                let id = Uuid::now_v7();
                let rejection = self.check(&file);
                panel.entries.push(UploadEntry {
                    id,
                    file_name: file.name.clone(),
                    size_bytes: file.size(),
                    progress: 0,
                    state: if rejection.is_some() {
                        UploadState::Failed
                    } else {
                        UploadState::Pending
                    },
                    error: rejection.clone(),
                    document_id: None,
                });
                match rejection {
                    Some(reason) => {
                        debug!(component = "uploads", file = %file.name, reason = %reason, "File rejected");
                        self.notices.error(reason);
                    }
                    None => accepted.push((id, file)),
                }
            }
        }

        let uploads = accepted.into_iter().map(|(id, file)| {
            let metadata = initial_metadata.clone();
            async move {
                let name = file.name.clone();
                self.transition(id, UploadState::Uploading, 0, None, None);
                match self.api.upload_document(file, metadata).await {
                    Ok(doc) => {
                        self.transition(id, UploadState::Complete, 100, None, Some(doc.id));
                        Some(doc)
                    }
                    Err(e) => {
                        self.transition(id, UploadState::Failed, 0, Some(e.to_string()), None);
                        self.report_failure(&name, &e);
                        None
                    }
                }
            }
        });
        let created: Vec<Document> = join_all(uploads).await.into_iter().flatten().collect();

        if !created.is_empty() {
            let message = if created.len() == 1 {
                "1 document uploaded successfully.".to_string()
            } else {
                format!("{} documents uploaded successfully.", created.len())
            };
            self.notices.success(message);
        }
        info!(
            component = "uploads",
            op = "upload",
            document_count = created.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Upload batch finished"
        );
        created
    }

    /// Reason a file cannot be uploaded, if any.
    fn check(&self, file: &UploadFile) -> Option<String> {
        if !self.config.accepts_mime_type(&file.mime_type) {
            return Some(format!(
                "{} is not an accepted file type. Allowed types: {}.",
                file.name,
                self.config.allowed_mime_types.join(", ")
            ));
        }
        if file.size() == 0 {
            return Some(format!("{} is empty.", file.name));
        }
        if file.size() > self.config.upload_max_bytes {
            return Some(format!(
                "{} exceeds the maximum upload size of {}.",
                file.name,
                format_file_size(self.config.upload_max_bytes)
            ));
        }
        None
    }

    fn report_failure(&self, file_name: &str, error: &Error) {
        let detail = error_detail(error);
        self.errors.report(
            OperationKind::Upload,
            None,
            error,
            ReportOptions::new()
                .without_retry()
                .with_message(format!("Failed to upload {}: {}", file_name, detail)),
        );
    }

    fn transition(
        &self,
        id: Uuid,
        state: UploadState,
        progress: u8,
        error: Option<String>,
        document_id: Option<DocumentId>,
    ) {
        let file_name = {
            let mut panel = lock(&self.panel);
            let Some(entry) = panel.entries.iter_mut().find(|e| e.id == id) else {
                return;
            };
            entry.state = state;
            entry.progress = progress;
            entry.error = error;
            entry.document_id = document_id;
            entry.file_name.clone()
        };
        self.bus.emit(RepositoryEvent::UploadProgress {
            upload_id: id,
            file_name,
            progress,
            state: state.as_str().to_string(),
        });
    }

    /// Snapshot of the feedback panel rows.
    pub fn uploads(&self) -> Vec<UploadEntry> {
        lock(&self.panel).entries.clone()
    }

    /// Whether any file is still pending or uploading.
    pub fn is_uploading(&self) -> bool {
        lock(&self.panel)
            .entries
            .iter()
            .any(|e| !e.state.is_finished())
    }

    pub fn is_feedback_visible(&self) -> bool {
        lock(&self.panel).visible
    }

    pub fn show_feedback(&self) {
        lock(&self.panel).visible = true;
    }

    /// Hide the feedback panel and forget finished uploads.
    pub fn close_feedback(&self) {
        let mut panel = lock(&self.panel);
        panel.visible = false;
        panel.entries.retain(|e| !e.state.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_core::mock::{ApiOperation, MockDocumentApi};
    use docrepo_core::NoticeLevel;

    fn coordinator(api: MockDocumentApi) -> (UploadCoordinator, NotificationService, Arc<ErrorHandler>) {
        let bus = Arc::new(EventBus::new(64));
        let notices = NotificationService::new(bus.clone(), 5_000);
        let errors = Arc::new(ErrorHandler::new(notices.clone(), bus.clone()));
        let config = RepositoryConfig::default().with_upload_max_bytes(1024);
        (
            UploadCoordinator::new(Arc::new(api), config, notices.clone(), errors.clone(), bus),
            notices,
            errors,
        )
    }

    fn pdf(name: &str, size: usize) -> UploadFile {
        UploadFile::new(name, "application/pdf", vec![1; size])
    }

    #[tokio::test]
    async fn test_uploads_accepted_files() {
        let api = MockDocumentApi::new();
        let (uploads, notices, _) = coordinator(api.clone());

        let created = uploads
            .handle_files(vec![pdf("a.pdf", 10), pdf("b.pdf", 20)], None)
            .await;

        assert_eq!(created.len(), 2);
        assert_eq!(api.call_count(ApiOperation::Upload), 2);
        assert!(uploads
            .uploads()
            .iter()
            .all(|e| e.state == UploadState::Complete && e.progress == 100));
        assert!(!uploads.is_uploading());
        assert!(uploads.is_feedback_visible());
        assert_eq!(notices.notices()[0].message, "2 documents uploaded successfully.");
    }

    #[tokio::test]
    async fn test_rejects_wrong_type_and_oversized_without_calling_api() {
        let api = MockDocumentApi::new();
        let (uploads, notices, _) = coordinator(api.clone());

        let created = uploads
            .handle_files(
                vec![
                    UploadFile::new("photo.png", "image/png", vec![1; 10]),
                    pdf("huge.pdf", 4096),
                ],
                None,
            )
            .await;

        assert!(created.is_empty());
        assert_eq!(api.call_count(ApiOperation::Upload), 0);
        let entries = uploads.uploads();
        assert!(entries.iter().all(|e| e.state == UploadState::Failed));
        assert!(entries[1].error.as_deref().unwrap().contains("1 KB"));
        assert!(notices.notices().iter().all(|n| n.level == NoticeLevel::Error));
    }

    #[tokio::test]
    async fn test_failed_upload_reported_not_queued() {
        let api = MockDocumentApi::new().fail_on(
            ApiOperation::Upload,
            None,
            Error::Server {
                status: 500,
                message: Some("disk full".into()),
            },
        );
        let (uploads, notices, errors) = coordinator(api);

        let created = uploads.handle_files(vec![pdf("a.pdf", 10)], None).await;
        assert!(created.is_empty());
        assert_eq!(errors.queued(), 0);
        assert_eq!(notices.notices()[0].message, "Failed to upload a.pdf: disk full");
        assert_eq!(uploads.uploads()[0].state, UploadState::Failed);
    }

    #[tokio::test]
    async fn test_close_feedback_drops_finished() {
        let (uploads, _, _) = coordinator(MockDocumentApi::new());
        uploads.handle_files(vec![pdf("a.pdf", 10)], None).await;

        uploads.close_feedback();
        assert!(!uploads.is_feedback_visible());
        assert!(uploads.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_progress_events() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let notices = NotificationService::new(bus.clone(), 5_000);
        let errors = Arc::new(ErrorHandler::new(notices.clone(), bus.clone()));
        let uploads = UploadCoordinator::new(
            Arc::new(MockDocumentApi::new()),
            RepositoryConfig::default(),
            notices,
            errors,
            bus,
        );

        uploads.handle_files(vec![pdf("a.pdf", 10)], None).await;

        let mut states = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let RepositoryEvent::UploadProgress { state, .. } = envelope.payload {
                states.push(state);
            }
        }
        assert_eq!(states, vec!["uploading", "complete"]);
    }
}
