//! Document list orchestration.
//!
//! [`DocumentListOrchestrator`] wires the notification service, error
//! handler, metadata engine, lifecycle controller and upload coordinator
//! to one [`DocumentApi`] and owns what the list view shows: the canonical
//! page of documents, the status filter, the selection, the status counts
//! and the configured metadata fields.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use docrepo_core::defaults::FIRST_PAGE;
use docrepo_core::format::EMPTY_CELL;
use docrepo_core::{
    display_file_size, display_file_type, display_filename, Document, DocumentApi, DocumentId,
    DocumentPage, Error, EventBus, EventEnvelope, FieldControl, ListDocumentsRequest,
    MetadataField, MetadataMap, MetadataValue, RepositoryConfig, Result, StatusCounts,
    StatusFilter, UploadFile, EXCERPT_FIELD,
};

use crate::error_handling::{
    ErrorHandler, OperationKind, RetryHandler, RetryHandlers, RetryReport,
};
use crate::lifecycle::{ConfirmationPrompt, LifecycleController, LifecycleOutcome, SelectionSink};
use crate::lock;
use crate::metadata::{MetadataEngine, SaveOutcome, SkipReason};
use crate::notifications::NotificationService;
use crate::uploads::UploadCoordinator;

// =============================================================================
// SELECTION
// =============================================================================

/// Selected document ids, shared with the lifecycle controller.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: Arc<Mutex<BTreeSet<DocumentId>>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: DocumentId, selected: bool) {
        let mut ids = lock(&self.ids);
        if selected {
            ids.insert(id);
        } else {
            ids.remove(&id);
        }
    }

    /// Replace the selection with `ids`.
    pub fn replace(&self, ids: impl IntoIterator<Item = DocumentId>) {
        *lock(&self.ids) = ids.into_iter().collect();
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        lock(&self.ids).contains(&id)
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        lock(&self.ids).iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ids).is_empty()
    }
}

impl SelectionSink for Selection {
    fn clear_selection(&self) {
        lock(&self.ids).clear();
    }

    fn deselect(&self, ids: &[DocumentId]) {
        let mut selected = lock(&self.ids);
        for id in ids {
            selected.remove(id);
        }
    }
}

// =============================================================================
// VIEW MODELS
// =============================================================================

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowCell {
    /// Read-only text.
    Text { column: String, text: String },
    /// Spreadsheet input bound to a buffered value.
    Input {
        field_id: String,
        control: FieldControl,
        value: String,
    },
}

/// Per-row buttons. None are offered in spreadsheet mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RowAction {
    Download { url: String },
    EditMetadata,
    Trash,
    Restore,
    DeletePermanently,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRow {
    pub document_id: DocumentId,
    pub selected: bool,
    pub title: String,
    pub cells: Vec<RowCell>,
    pub actions: Vec<RowAction>,
}

/// Labels and visibility of the list toolbar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toolbar {
    pub all_label: String,
    pub trash_label: String,
    pub spreadsheet_toggle: &'static str,
    /// Present while spreadsheet mode holds unsaved changes.
    pub save_button: Option<&'static str>,
    pub bulk_restore: Option<String>,
    pub bulk_delete: Option<String>,
    pub bulk_restore_disabled: bool,
    pub bulk_delete_disabled: bool,
}

#[derive(Debug, Default)]
struct ListState {
    documents: Vec<Document>,
    fields: Vec<MetadataField>,
    filter: StatusFilter,
    current_page: u32,
    total_pages: u32,
    total_count: u64,
    counts: StatusCounts,
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Composes every engine component around one document list.
pub struct DocumentListOrchestrator {
    api: Arc<dyn DocumentApi>,
    config: RepositoryConfig,
    bus: Arc<EventBus>,
    notices: NotificationService,
    errors: Arc<ErrorHandler>,
    engine: Arc<MetadataEngine>,
    lifecycle: Arc<LifecycleController>,
    uploads: UploadCoordinator,
    selection: Selection,
    state: Mutex<ListState>,
}

impl DocumentListOrchestrator {
    /// Build the component graph. Fails when `config` does not validate.
    pub fn new(api: Arc<dyn DocumentApi>, config: RepositoryConfig) -> Result<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::new(config.event_capacity));
        let notices = NotificationService::new(bus.clone(), config.notice_duration_ms);
        let errors = Arc::new(ErrorHandler::new(notices.clone(), bus.clone()));
        let selection = Selection::new();

        let engine = Arc::new(MetadataEngine::new(
            api.clone(),
            notices.clone(),
            errors.clone(),
            bus.clone(),
        ));
        let lifecycle = Arc::new(
            LifecycleController::new(api.clone(), notices.clone(), errors.clone(), bus.clone())
                .with_selection_sink(Arc::new(selection.clone())),
        );
        let uploads = UploadCoordinator::new(
            api.clone(),
            config.clone(),
            notices.clone(),
            errors.clone(),
            bus.clone(),
        );

        debug!(
            component = "list",
            page_size = config.page_size,
            api_namespace = %config.api_namespace,
            "Document list created"
        );

        Ok(Self {
            api,
            config,
            bus,
            notices,
            errors,
            engine,
            lifecycle,
            uploads,
            selection,
            state: Mutex::new(ListState {
                current_page: FIRST_PAGE,
                total_pages: 1,
                ..ListState::default()
            }),
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.bus.subscribe()
    }

    pub fn notices(&self) -> &NotificationService {
        &self.notices
    }

    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    pub fn engine(&self) -> &MetadataEngine {
        &self.engine
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn uploads(&self) -> &UploadCoordinator {
        &self.uploads
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    // ─── Loading ──────────────────────────────────────────────────────────

    /// Fetch the configured metadata fields.
    pub async fn load_fields(&self) -> Result<Vec<MetadataField>> {
        let fields = self.api.get_metadata_fields().await?;
        self.engine.set_fields(fields);
        let fields = self.engine.fields();
        lock(&self.state).fields = fields.clone();
        debug!(component = "list", field_count = fields.len(), "Metadata fields loaded");
        Ok(fields)
    }

    /// Fetch one page for the current filter. A page past the end (after
    /// documents were removed) falls back to the last page.
    pub async fn load_page(&self, page: u32) -> Result<DocumentPage> {
        let filter = self.filter();
        let page_size = self.config.page_size;
        let mut result = self
            .api
            .list_documents(ListDocumentsRequest::new(page.max(FIRST_PAGE), page_size, filter))
            .await?;
        if result.documents.is_empty() && result.current_page > result.total_pages {
            result = self
                .api
                .list_documents(ListDocumentsRequest::new(result.total_pages, page_size, filter))
                .await?;
        }

        {
            let mut state = lock(&self.state);
            state.documents = result.documents.clone();
            state.current_page = result.current_page;
            state.total_pages = result.total_pages.max(1);
            state.total_count = result.total_count;
        }
        self.engine.replace_documents(result.documents.clone());
        info!(
            component = "list",
            op = "load_page",
            page = result.current_page,
            document_count = result.documents.len(),
            filter = filter.as_str(),
            "Document page loaded"
        );
        Ok(result)
    }

    /// Switch between the regular and the trash view.
    pub async fn change_filter(&self, filter: StatusFilter) -> Result<DocumentPage> {
        {
            let mut state = lock(&self.state);
            state.filter = filter;
            state.current_page = FIRST_PAGE;
        }
        self.selection.clear_selection();
        if self.engine.state().is_spreadsheet_mode {
            self.engine.exit_spreadsheet_mode();
        }
        self.load_page(FIRST_PAGE).await
    }

    pub async fn refresh_counts(&self) -> Result<StatusCounts> {
        let counts = self.api.get_status_counts().await?;
        lock(&self.state).counts = counts.clone();
        Ok(counts)
    }

    /// Reload the current page and the counts.
    pub async fn refresh(&self) -> Result<()> {
        let page = self.current_page();
        self.load_page(page).await?;
        self.refresh_counts().await?;
        Ok(())
    }

    async fn refresh_after(&self, op: &'static str) {
        if let Err(e) = self.refresh().await {
            warn!(component = "list", op, error = %e, "Reload after change failed");
        }
    }

    fn adopt_shadow(&self) {
        let documents = self.engine.documents();
        lock(&self.state).documents = documents;
    }

    // ─── Accessors ────────────────────────────────────────────────────────

    /// The canonical collection shown to the user.
    pub fn documents(&self) -> Vec<Document> {
        lock(&self.state).documents.clone()
    }

    pub fn fields(&self) -> Vec<MetadataField> {
        lock(&self.state).fields.clone()
    }

    pub fn filter(&self) -> StatusFilter {
        lock(&self.state).filter
    }

    pub fn current_page(&self) -> u32 {
        lock(&self.state).current_page
    }

    pub fn total_pages(&self) -> u32 {
        lock(&self.state).total_pages
    }

    pub fn total_count(&self) -> u64 {
        lock(&self.state).total_count
    }

    pub fn counts(&self) -> StatusCounts {
        lock(&self.state).counts.clone()
    }

    // ─── Selection ────────────────────────────────────────────────────────

    pub fn select(&self, id: DocumentId, selected: bool) {
        self.selection.set(id, selected);
    }

    /// Select or clear every document on the current page.
    pub fn select_all(&self, selected: bool) {
        if selected {
            let ids: Vec<DocumentId> = self.documents().iter().map(|d| d.id).collect();
            self.selection.replace(ids);
        } else {
            self.selection.clear_selection();
        }
    }

    pub fn selected(&self) -> Vec<DocumentId> {
        self.selection.ids()
    }

    // ─── View models ──────────────────────────────────────────────────────

    /// Table rows for the current page.
    pub fn rows(&self) -> Vec<DocumentRow> {
        let (documents, fields, filter) = {
            let state = lock(&self.state);
            (state.documents.clone(), state.fields.clone(), state.filter)
        };
        let edit = self.engine.state();
        let spreadsheet = edit.is_spreadsheet_mode;

        documents
            .iter()
            .map(|doc| {
                let buffered = edit.bulk_edited_metadata.get(&doc.id);
                let buffered_value = |field_id: &str| -> Option<String> {
                    buffered.and_then(|row| row.get(field_id)).map(MetadataValue::coerce)
                };

                let mut cells = Vec::with_capacity(fields.len() + 3);
                cells.push(if spreadsheet {
                    RowCell::Input {
                        field_id: EXCERPT_FIELD.to_string(),
                        control: FieldControl::Text,
                        value: buffered_value(EXCERPT_FIELD)
                            .unwrap_or_else(|| doc.excerpt_text().to_string()),
                    }
                } else {
                    text_cell(EXCERPT_FIELD, doc.excerpt_text())
                });

                for field in &fields {
                    cells.push(if spreadsheet {
                        RowCell::Input {
                            field_id: field.id.clone(),
                            control: field.control(),
                            value: buffered_value(&field.id).unwrap_or_default(),
                        }
                    } else {
                        let text = doc.meta(&field.id).map(MetadataValue::display);
                        text_cell(&field.id, text.as_deref().unwrap_or(""))
                    });
                }
                cells.push(RowCell::Text {
                    column: "file_size".to_string(),
                    text: display_file_size(doc),
                });
                cells.push(RowCell::Text {
                    column: "file_type".to_string(),
                    text: display_file_type(doc),
                });

                DocumentRow {
                    document_id: doc.id,
                    selected: self.selection.contains(doc.id),
                    title: if doc.title.trim().is_empty() {
                        display_filename(doc)
                    } else {
                        doc.title.clone()
                    },
                    cells,
                    actions: if spreadsheet {
                        Vec::new()
                    } else {
                        row_actions(doc, filter)
                    },
                }
            })
            .collect()
    }

    pub fn toolbar(&self) -> Toolbar {
        let (filter, counts) = {
            let state = lock(&self.state);
            (state.filter, state.counts.clone())
        };
        let edit = self.engine.state();
        let busy = self.lifecycle.state();
        let selected = self.selection.len();
        let trash_view = filter.is_trash_view();

        Toolbar {
            all_label: format!("All ({})", counts.total_active()),
            trash_label: format!("Trash ({})", counts.trashed()),
            spreadsheet_toggle: if edit.is_spreadsheet_mode {
                "Exit Spreadsheet Mode"
            } else {
                "Enter Spreadsheet Mode"
            },
            save_button: (edit.is_spreadsheet_mode && edit.has_metadata_changes).then_some(
                if edit.is_saving_bulk {
                    "Saving…"
                } else {
                    "Save Changes"
                },
            ),
            bulk_restore: (trash_view && selected > 0)
                .then(|| format!("Restore Selected ({})", selected)),
            bulk_delete: (selected > 0).then(|| {
                if trash_view {
                    format!("Delete Selected Permanently ({})", selected)
                } else {
                    format!("Trash Selected ({})", selected)
                }
            }),
            bulk_restore_disabled: busy.is_multi_restoring,
            bulk_delete_disabled: busy.is_multi_deleting,
        }
    }

    /// Confirmation texts for the open dialogs, if any.
    pub fn confirmation(&self) -> Option<ConfirmationPrompt> {
        let filter = self.filter();
        let state = self.lifecycle.state();
        let selected = self.selection.len();
        if state.pending_delete.is_some() {
            Some(ConfirmationPrompt::delete(filter))
        } else if state.pending_restore.is_some() {
            Some(ConfirmationPrompt::restore())
        } else if state.bulk_delete_open {
            Some(ConfirmationPrompt::bulk_delete(filter, selected))
        } else if state.bulk_restore_open {
            Some(ConfirmationPrompt::bulk_restore(selected))
        } else {
            None
        }
    }

    // ─── Metadata ─────────────────────────────────────────────────────────

    pub fn begin_edit(&self, id: DocumentId) -> Result<()> {
        let document = self
            .documents()
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(Error::DocumentNotFound(id))?;
        self.engine.begin_edit(Some(&document))
    }

    pub fn toggle_spreadsheet_mode(&self) -> Result<()> {
        if self.engine.state().is_spreadsheet_mode {
            self.engine.exit_spreadsheet_mode();
            Ok(())
        } else {
            self.engine.enter_spreadsheet_mode()
        }
    }

    pub async fn save_single(&self) -> SaveOutcome {
        let outcome = self.engine.save_single().await;
        self.adopt_shadow();
        outcome
    }

    pub async fn save_bulk(&self) -> SaveOutcome {
        let outcome = self.engine.save_bulk().await;
        self.adopt_shadow();
        outcome
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────

    /// Confirm the pending single delete.
    pub async fn confirm_delete(&self) -> LifecycleOutcome {
        let Some(id) = self.lifecycle.state().pending_delete else {
            return LifecycleOutcome::Skipped;
        };
        self.delete_document(id).await
    }

    pub async fn delete_document(&self, id: DocumentId) -> LifecycleOutcome {
        let outcome = self.lifecycle.delete_single(id, self.filter()).await;
        if outcome.is_completed() {
            self.refresh_after("delete").await;
        }
        outcome
    }

    /// Confirm the pending single restore.
    pub async fn confirm_restore(&self) -> LifecycleOutcome {
        let Some(id) = self.lifecycle.state().pending_restore else {
            return LifecycleOutcome::Skipped;
        };
        self.restore_document(id).await
    }

    pub async fn restore_document(&self, id: DocumentId) -> LifecycleOutcome {
        let outcome = self.lifecycle.restore_single(id, self.filter()).await;
        if outcome.is_completed() {
            self.refresh_after("restore").await;
        }
        outcome
    }

    /// Delete (or trash) every selected document.
    pub async fn delete_selected(&self) -> LifecycleOutcome {
        let ids = self.selected();
        let outcome = self.lifecycle.delete_bulk(&ids, self.filter()).await;
        if outcome.is_completed() {
            self.refresh_after("bulk_delete").await;
        }
        outcome
    }

    pub async fn restore_selected(&self) -> LifecycleOutcome {
        let ids = self.selected();
        let outcome = self.lifecycle.restore_bulk(&ids, self.filter()).await;
        if outcome.is_completed() {
            self.refresh_after("bulk_restore").await;
        }
        outcome
    }

    // ─── Uploads ──────────────────────────────────────────────────────────

    pub async fn upload_files(
        &self,
        files: Vec<UploadFile>,
        initial_metadata: Option<MetadataMap>,
    ) -> Vec<Document> {
        let created = self.uploads.handle_files(files, initial_metadata).await;
        if !created.is_empty() {
            self.refresh_after("upload").await;
        }
        created
    }

    // ─── Retry ────────────────────────────────────────────────────────────

    /// Replay the retry queue with handlers for deletes, restores and
    /// metadata saves, then reload when anything went through.
    pub async fn retry_all(&self) -> RetryReport {
        let (filter, visible) = {
            let state = lock(&self.state);
            (
                state.filter,
                state.documents.iter().map(|d| d.id).collect::<BTreeSet<_>>(),
            )
        };
        let handlers = RetryHandlers::new()
            .with(
                OperationKind::Delete,
                Arc::new(DeleteRetry {
                    lifecycle: self.lifecycle.clone(),
                    filter,
                    visible,
                }),
            )
            .with(
                OperationKind::Restore,
                Arc::new(RestoreRetry {
                    lifecycle: self.lifecycle.clone(),
                }),
            )
            .with(
                OperationKind::Metadata,
                Arc::new(MetadataRetry {
                    engine: self.engine.clone(),
                }),
            );

        let report = self.errors.retry_all(&handlers).await;
        self.adopt_shadow();
        if report.succeeded > 0 {
            self.refresh_after("retry").await;
        }
        report
    }
}

fn text_cell(column: &str, text: &str) -> RowCell {
    RowCell::Text {
        column: column.to_string(),
        text: if text.trim().is_empty() {
            EMPTY_CELL.to_string()
        } else {
            text.to_string()
        },
    }
}

fn row_actions(document: &Document, filter: StatusFilter) -> Vec<RowAction> {
    if filter.is_trash_view() {
        return vec![RowAction::Restore, RowAction::DeletePermanently];
    }
    let mut actions = Vec::with_capacity(3);
    if let Some(url) = document.file().url {
        actions.push(RowAction::Download { url });
    }
    actions.push(RowAction::EditMetadata);
    actions.push(RowAction::Trash);
    actions
}

fn lifecycle_result(outcome: LifecycleOutcome) -> Result<()> {
    match outcome {
        LifecycleOutcome::Completed { .. } | LifecycleOutcome::Skipped => Ok(()),
        LifecycleOutcome::Failed(e) => Err(e),
        LifecycleOutcome::Busy => Err(Error::InvalidState(
            "operation already in progress".to_string(),
        )),
    }
}

fn require_subject(subject_id: Option<DocumentId>) -> Result<DocumentId> {
    subject_id.ok_or_else(|| Error::InvalidInput("retry needs a document id".to_string()))
}

/// Re-runs a single delete. Documents still on the page use the page's
/// view; anything else is only moved to the trash.
struct DeleteRetry {
    lifecycle: Arc<LifecycleController>,
    filter: StatusFilter,
    visible: BTreeSet<DocumentId>,
}

#[async_trait]
impl RetryHandler for DeleteRetry {
    async fn retry(&self, subject_id: Option<DocumentId>) -> Result<()> {
        let id = require_subject(subject_id)?;
        let filter = if self.visible.contains(&id) {
            self.filter
        } else {
            StatusFilter::All
        };
        lifecycle_result(self.lifecycle.delete_single(id, filter).await)
    }
}

struct RestoreRetry {
    lifecycle: Arc<LifecycleController>,
}

#[async_trait]
impl RetryHandler for RestoreRetry {
    async fn retry(&self, subject_id: Option<DocumentId>) -> Result<()> {
        let id = require_subject(subject_id)?;
        lifecycle_result(
            self.lifecycle
                .restore_single(id, StatusFilter::Trash)
                .await,
        )
    }
}

struct MetadataRetry {
    engine: Arc<MetadataEngine>,
}

#[async_trait]
impl RetryHandler for MetadataRetry {
    async fn retry(&self, subject_id: Option<DocumentId>) -> Result<()> {
        let id = require_subject(subject_id)?;
        match self.engine.retry_metadata(id).await {
            // Nothing left to save: an earlier save already took the row.
            SaveOutcome::Saved { .. }
            | SaveOutcome::Unchanged
            | SaveOutcome::Skipped(SkipReason::NotEditing | SkipReason::NotInSpreadsheetMode) => {
                Ok(())
            }
            SaveOutcome::Failed(e) => Err(e),
            SaveOutcome::Partial { failed, .. } => Err(Error::Internal(format!(
                "{} metadata update(s) failed again",
                failed.len()
            ))),
            SaveOutcome::Skipped(reason) => Err(Error::InvalidState(format!(
                "no pending metadata for document {}: {:?}",
                id, reason
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_core::mock::MockDocumentApi;
    use docrepo_core::DocumentStatus;

    fn orchestrator(api: &MockDocumentApi) -> DocumentListOrchestrator {
        DocumentListOrchestrator::new(Arc::new(api.clone()), RepositoryConfig::default()).unwrap()
    }

    fn api() -> MockDocumentApi {
        MockDocumentApi::new()
            .with_fields([MetadataField::taxonomy(
                "category",
                "Category",
                ["Policy", "Guideline"],
            )])
            .with_documents([
                Document::new(1, "One").with_meta("category", "Policy"),
                Document::new(2, "Two"),
                Document::new(3, "Gone").with_status(DocumentStatus::Trashed),
            ])
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = DocumentListOrchestrator::new(
            Arc::new(MockDocumentApi::new()),
            RepositoryConfig::default().with_page_size(0),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_selection_sink() {
        let selection = Selection::new();
        selection.replace([1, 2, 3]);
        selection.deselect(&[2]);
        assert_eq!(selection.ids(), vec![1, 3]);
        selection.clear_selection();
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn test_rows_render_display_values() {
        let api = api();
        let list = orchestrator(&api);
        list.load_fields().await.unwrap();
        list.load_page(1).await.unwrap();

        let rows = list.rows();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].document_id, 2);
        assert_eq!(
            rows[1].cells[1],
            RowCell::Text {
                column: "category".into(),
                text: "Policy".into()
            }
        );
        assert_eq!(
            rows[0].cells[0],
            RowCell::Text {
                column: EXCERPT_FIELD.into(),
                text: EMPTY_CELL.into()
            }
        );
        assert!(rows[0].actions.contains(&RowAction::Trash));
    }

    #[tokio::test]
    async fn test_spreadsheet_rows_are_inputs_without_actions() {
        let api = api();
        let list = orchestrator(&api);
        list.load_fields().await.unwrap();
        list.load_page(1).await.unwrap();
        list.toggle_spreadsheet_mode().unwrap();

        let rows = list.rows();
        assert!(rows.iter().all(|r| r.actions.is_empty()));
        let RowCell::Input { control, value, .. } = &rows[1].cells[1] else {
            panic!("expected an input cell");
        };
        assert_eq!(value, "Policy");
        assert!(matches!(control, FieldControl::Choice(choices) if choices.len() == 3));
        assert_eq!(list.toolbar().spreadsheet_toggle, "Exit Spreadsheet Mode");
        assert_eq!(list.toolbar().save_button, None);
    }

    #[tokio::test]
    async fn test_toolbar_labels_follow_view_and_selection() {
        let api = api();
        let list = orchestrator(&api);
        list.refresh().await.unwrap();
        list.select_all(true);

        let toolbar = list.toolbar();
        assert_eq!(toolbar.all_label, "All (2)");
        assert_eq!(toolbar.trash_label, "Trash (1)");
        assert_eq!(toolbar.bulk_delete.as_deref(), Some("Trash Selected (2)"));
        assert_eq!(toolbar.bulk_restore, None);

        list.change_filter(StatusFilter::Trash).await.unwrap();
        assert!(list.selected().is_empty());
        list.select(3, true);
        let toolbar = list.toolbar();
        assert_eq!(
            toolbar.bulk_delete.as_deref(),
            Some("Delete Selected Permanently (1)")
        );
        assert_eq!(toolbar.bulk_restore.as_deref(), Some("Restore Selected (1)"));
        assert_eq!(
            list.rows()[0].actions,
            vec![RowAction::Restore, RowAction::DeletePermanently]
        );
    }

    #[tokio::test]
    async fn test_change_filter_exits_spreadsheet_mode() {
        let api = api();
        let list = orchestrator(&api);
        list.load_page(1).await.unwrap();
        list.toggle_spreadsheet_mode().unwrap();
        list.change_filter(StatusFilter::Trash).await.unwrap();
        assert!(!list.engine().state().is_spreadsheet_mode);
        assert_eq!(list.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_follows_pending_state() {
        let api = api();
        let list = orchestrator(&api);
        list.load_page(1).await.unwrap();
        assert!(list.confirmation().is_none());

        list.lifecycle().request_delete(1);
        let prompt = list.confirmation().unwrap();
        assert_eq!(prompt, ConfirmationPrompt::delete(StatusFilter::All));

        assert!(list.confirm_delete().await.is_completed());
        assert!(list.confirmation().is_none());
        assert_eq!(list.documents().len(), 1);
        assert_eq!(list.counts().trashed(), 2);
    }
}
