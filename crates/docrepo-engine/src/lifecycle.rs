//! Document lifecycle controller: trash, permanent delete and restore.
//!
//! What "delete" means depends on the list view. In the trash view it
//! removes a document for good; in every other view it moves the document
//! to the trash. Bulk operations are all-or-nothing: the batch either
//! succeeds as a whole or is reported as one failure.
//!
//! Destructive actions go through a confirmation step first. The controller
//! keeps that gating state (which document is pending confirmation, which
//! bulk dialog is open) next to the busy flags.

use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use docrepo_core::{
    DocumentApi, DocumentId, Error, EventBus, RepositoryEvent, Result, StatusFilter,
};

use crate::error_handling::{error_detail, ErrorHandler, OperationKind, ReportOptions};
use crate::guard::OnDrop;
use crate::lock;
use crate::notifications::NotificationService;

/// Receives selection changes after successful lifecycle operations.
pub trait SelectionSink: Send + Sync {
    fn clear_selection(&self);

    fn deselect(&self, ids: &[DocumentId]);
}

/// Confirmation gating and busy flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleState {
    /// Document whose delete confirmation is open.
    pub pending_delete: Option<DocumentId>,
    /// Document whose restore confirmation is open.
    pub pending_restore: Option<DocumentId>,
    pub bulk_delete_open: bool,
    pub bulk_restore_open: bool,
    pub is_deleting: bool,
    pub is_restoring: bool,
    pub is_multi_deleting: bool,
    pub is_multi_restoring: bool,
}

/// Result of a lifecycle operation.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOutcome {
    Completed { document_ids: Vec<DocumentId> },
    /// Already reported through the error handler.
    Failed(Error),
    /// The same operation is still in flight.
    Busy,
    /// Nothing to do: empty selection, or a restore outside the trash view.
    Skipped,
}

impl LifecycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Texts of a confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPrompt {
    pub title: String,
    pub warning: String,
    /// Heading above the list of affected document titles.
    pub list_heading: String,
    pub confirm_label: String,
    pub busy_label: String,
}

impl ConfirmationPrompt {
    pub fn delete(filter: StatusFilter) -> Self {
        if filter.is_trash_view() {
            Self::new(
                "Delete Document Permanently",
                "Are you sure you want to delete this document? This action cannot be undone.",
                "Document to be deleted:".to_string(),
                "Delete Permanently",
                "Deleting…",
            )
        } else {
            Self::new(
                "Trash Document",
                "Are you sure you want to trash this document?",
                "Document to be trashed:".to_string(),
                "Trash",
                "Trashing…",
            )
        }
    }

    pub fn bulk_delete(filter: StatusFilter, count: usize) -> Self {
        if filter.is_trash_view() {
            Self::new(
                "Delete Selected Documents Permanently",
                "Are you sure you want to delete the selected documents? This action cannot be undone.",
                format!("Documents to be deleted ({}):", count),
                "Delete Selected Permanently",
                "Deleting…",
            )
        } else {
            Self::new(
                "Trash Selected Documents",
                "Are you sure you want to trash the selected documents?",
                format!("Documents to be trashed ({}):", count),
                "Trash Selected",
                "Trashing…",
            )
        }
    }

    pub fn restore() -> Self {
        Self::new(
            "Restore Document",
            "Are you sure you want to restore this document?",
            "Document to be restored:".to_string(),
            "Restore",
            "Restoring…",
        )
    }

    pub fn bulk_restore(count: usize) -> Self {
        Self::new(
            "Restore Selected Documents",
            "Are you sure you want to restore the selected documents?",
            format!("Documents to be restored ({}):", count),
            "Restore Selected",
            "Restoring…",
        )
    }

    /// Label of the confirm button for the current busy state.
    pub fn button_label(&self, busy: bool) -> &str {
        if busy {
            &self.busy_label
        } else {
            &self.confirm_label
        }
    }

    fn new(title: &str, warning: &str, list_heading: String, confirm: &str, busy: &str) -> Self {
        Self {
            title: title.to_string(),
            warning: warning.to_string(),
            list_heading,
            confirm_label: confirm.to_string(),
            busy_label: busy.to_string(),
        }
    }
}

fn verb(filter: StatusFilter) -> &'static str {
    if filter.is_trash_view() {
        "deleting"
    } else {
        "trashing"
    }
}

fn past(filter: StatusFilter) -> &'static str {
    if filter.is_trash_view() {
        "deleted"
    } else {
        "trashed"
    }
}

/// Runs trash, permanent delete and restore workflows.
pub struct LifecycleController {
    api: Arc<dyn DocumentApi>,
    notices: NotificationService,
    errors: Arc<ErrorHandler>,
    bus: Arc<EventBus>,
    selection: Option<Arc<dyn SelectionSink>>,
    state: Mutex<LifecycleState>,
}

impl LifecycleController {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        notices: NotificationService,
        errors: Arc<ErrorHandler>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            api,
            notices,
            errors,
            bus,
            selection: None,
            state: Mutex::new(LifecycleState::default()),
        }
    }

    pub fn with_selection_sink(mut self, sink: Arc<dyn SelectionSink>) -> Self {
        self.selection = Some(sink);
        self
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.state).clone()
    }

    // ─── Confirmation gating ──────────────────────────────────────────────

    pub fn request_delete(&self, id: DocumentId) {
        lock(&self.state).pending_delete = Some(id);
    }

    pub fn cancel_delete(&self) {
        lock(&self.state).pending_delete = None;
    }

    pub fn request_restore(&self, id: DocumentId) {
        lock(&self.state).pending_restore = Some(id);
    }

    pub fn cancel_restore(&self) {
        lock(&self.state).pending_restore = None;
    }

    pub fn open_bulk_delete(&self) {
        lock(&self.state).bulk_delete_open = true;
    }

    pub fn close_bulk_delete(&self) {
        lock(&self.state).bulk_delete_open = false;
    }

    pub fn open_bulk_restore(&self) {
        lock(&self.state).bulk_restore_open = true;
    }

    pub fn close_bulk_restore(&self) {
        lock(&self.state).bulk_restore_open = false;
    }

    // ─── Operations ───────────────────────────────────────────────────────

    /// Delete one document: permanently in the trash view, else move it to
    /// the trash. On failure the confirmation stays open.
    pub async fn delete_single(&self, id: DocumentId, filter: StatusFilter) -> LifecycleOutcome {
        let Some(_busy) = self.acquire(|s| &mut s.is_deleting) else {
            return LifecycleOutcome::Busy;
        };

        match self.remove(id, filter).await {
            Ok(()) => {
                lock(&self.state).pending_delete = None;
                if let Some(sink) = &self.selection {
                    sink.deselect(&[id]);
                }
                self.emit_removed(filter, vec![id]);
                info!(component = "lifecycle", op = past(filter), document_id = id, "Document removed");
                self.notices
                    .success(format!("Document {} successfully.", past(filter)));
                LifecycleOutcome::Completed {
                    document_ids: vec![id],
                }
            }
            Err(e) => {
                self.errors.report(
                    OperationKind::Delete,
                    Some(id),
                    &e,
                    ReportOptions::new().with_message(format!(
                        "Error {} document {}: {}",
                        verb(filter),
                        id,
                        error_detail(&e)
                    )),
                );
                LifecycleOutcome::Failed(e)
            }
        }
    }

    /// Delete every id concurrently. Any failure fails the whole batch. The
    /// bulk confirmation closes whatever the outcome.
    pub async fn delete_bulk(&self, ids: &[DocumentId], filter: StatusFilter) -> LifecycleOutcome {
        if ids.is_empty() {
            return LifecycleOutcome::Skipped;
        }
        let Some(_busy) = self.acquire(|s| &mut s.is_multi_deleting) else {
            return LifecycleOutcome::Busy;
        };

        let result = try_join_all(ids.iter().map(|id| self.remove(*id, filter))).await;
        lock(&self.state).bulk_delete_open = false;

        match result {
            Ok(_) => {
                if let Some(sink) = &self.selection {
                    sink.clear_selection();
                }
                self.emit_removed(filter, ids.to_vec());
                info!(
                    component = "lifecycle",
                    op = past(filter),
                    document_count = ids.len(),
                    "Documents removed"
                );
                self.notices
                    .success(format!("Selected documents were {} successfully.", past(filter)));
                LifecycleOutcome::Completed {
                    document_ids: ids.to_vec(),
                }
            }
            Err(e) => {
                self.errors.report(
                    OperationKind::BulkDelete,
                    None,
                    &e,
                    ReportOptions::new()
                        .without_retry()
                        .with_message(format!("Error {} one or more documents.", verb(filter))),
                );
                LifecycleOutcome::Failed(e)
            }
        }
    }

    /// Restore one trashed document. Only acts in the trash view.
    pub async fn restore_single(&self, id: DocumentId, filter: StatusFilter) -> LifecycleOutcome {
        if !filter.is_trash_view() {
            debug!(component = "lifecycle", document_id = id, "Restore outside trash view ignored");
            return LifecycleOutcome::Skipped;
        }
        let Some(_busy) = self.acquire(|s| &mut s.is_restoring) else {
            return LifecycleOutcome::Busy;
        };

        match self.api.restore_document(id).await {
            Ok(()) => {
                lock(&self.state).pending_restore = None;
                if let Some(sink) = &self.selection {
                    sink.deselect(&[id]);
                }
                self.bus.emit(RepositoryEvent::DocumentsRestored {
                    document_ids: vec![id],
                });
                info!(component = "lifecycle", op = "restore", document_id = id, "Document restored");
                self.notices.success("Document restored successfully.");
                LifecycleOutcome::Completed {
                    document_ids: vec![id],
                }
            }
            Err(e) => {
                self.errors.report(
                    OperationKind::Restore,
                    Some(id),
                    &e,
                    ReportOptions::new().with_message(format!(
                        "Error restoring document {}: {}",
                        id,
                        error_detail(&e)
                    )),
                );
                LifecycleOutcome::Failed(e)
            }
        }
    }

    /// Restore every id concurrently, all-or-nothing.
    pub async fn restore_bulk(&self, ids: &[DocumentId], filter: StatusFilter) -> LifecycleOutcome {
        if ids.is_empty() || !filter.is_trash_view() {
            return LifecycleOutcome::Skipped;
        }
        let Some(_busy) = self.acquire(|s| &mut s.is_multi_restoring) else {
            return LifecycleOutcome::Busy;
        };

        let result = try_join_all(ids.iter().map(|id| self.api.restore_document(*id))).await;
        lock(&self.state).bulk_restore_open = false;

        match result {
            Ok(_) => {
                if let Some(sink) = &self.selection {
                    sink.clear_selection();
                }
                self.bus.emit(RepositoryEvent::DocumentsRestored {
                    document_ids: ids.to_vec(),
                });
                info!(
                    component = "lifecycle",
                    op = "restore",
                    document_count = ids.len(),
                    "Documents restored"
                );
                self.notices
                    .success("Selected documents were restored successfully.");
                LifecycleOutcome::Completed {
                    document_ids: ids.to_vec(),
                }
            }
            Err(e) => {
                self.errors.report(
                    OperationKind::BulkRestore,
                    None,
                    &e,
                    ReportOptions::new()
                        .without_retry()
                        .with_message("Error restoring one or more documents."),
                );
                LifecycleOutcome::Failed(e)
            }
        }
    }

    async fn remove(&self, id: DocumentId, filter: StatusFilter) -> Result<()> {
        if filter.is_trash_view() {
            self.api.permanently_delete_document(id).await
        } else {
            self.api.trash_document(id).await
        }
    }

    fn emit_removed(&self, filter: StatusFilter, document_ids: Vec<DocumentId>) {
        let event = if filter.is_trash_view() {
            RepositoryEvent::DocumentsDeleted { document_ids }
        } else {
            RepositoryEvent::DocumentsTrashed { document_ids }
        };
        self.bus.emit(event);
    }

    /// Set a busy flag, returning a guard that clears it on drop. `None`
    /// when the flag is already set.
    fn acquire(
        &self,
        flag: fn(&mut LifecycleState) -> &mut bool,
    ) -> Option<OnDrop<impl FnMut() + '_>> {
        {
            let mut state = lock(&self.state);
            let busy = flag(&mut state);
            if *busy {
                return None;
            }
            *busy = true;
        }
        Some(OnDrop::new(move || *flag(&mut lock(&self.state)) = false))
    }
}
