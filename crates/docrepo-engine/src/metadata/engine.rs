use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info};

use docrepo_core::fields::sort_fields;
use docrepo_core::{
    CoreUpdate, Document, DocumentApi, DocumentId, Error, EventBus, MetadataField, MetadataMap,
    MetadataValue, NoticeLevel, RepositoryEvent, Result,
};

use super::diff::{diff_row, is_dirty, seed_values, RowDiff};
use super::state::{EditAction, EditState, FieldErrors};
use crate::error_handling::{error_detail, ErrorHandler, OperationKind, ReportOptions};
use crate::guard::OnDrop;
use crate::lock;
use crate::notifications::NotificationService;

/// Why a save did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotEditing,
    NotInSpreadsheetMode,
    SaveInProgress,
}

/// Result of a save. Failures have already been routed through the error
/// handler when this is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Every attempted call succeeded.
    Saved { document_ids: Vec<DocumentId> },
    /// Spreadsheet save where some documents failed. `attempted` counts
    /// documents that had at least one call.
    Partial {
        saved: Vec<DocumentId>,
        failed: Vec<DocumentId>,
        attempted: usize,
    },
    /// Single-document save that failed.
    Failed(Error),
    /// Nothing differed, no call was made.
    Unchanged,
    Skipped(SkipReason),
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Saved { .. } | Self::Unchanged)
    }
}

type CallResults = (Option<Result<Document>>, Option<Result<Document>>);

/// Owns the shadow document collection and both edit surfaces.
pub struct MetadataEngine {
    api: Arc<dyn DocumentApi>,
    notices: NotificationService,
    errors: Arc<ErrorHandler>,
    bus: Arc<EventBus>,
    fields: Mutex<Vec<MetadataField>>,
    documents: Mutex<Vec<Document>>,
    state: Mutex<EditState>,
}

impl MetadataEngine {
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
            fields: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
            state: Mutex::new(EditState::default()),
        }
    }

    pub fn with_fields(self, fields: Vec<MetadataField>) -> Self {
        self.set_fields(fields);
        self
    }

    pub fn with_documents(self, documents: Vec<Document>) -> Self {
        self.replace_documents(documents);
        self
    }

    /// Replace the configured fields (kept ordered by `order`).
    pub fn set_fields(&self, mut fields: Vec<MetadataField>) {
        sort_fields(&mut fields);
        *lock(&self.fields) = fields;
    }

    pub fn fields(&self) -> Vec<MetadataField> {
        lock(&self.fields).clone()
    }

    /// Replace the shadow collection with the caller's current collection.
    pub fn replace_documents(&self, documents: Vec<Document>) {
        debug!(component = "metadata", document_count = documents.len(), "Shadow collection replaced");
        *lock(&self.documents) = documents;
        let docs = self.documents();
        let mut state = lock(&self.state);
        if state.is_spreadsheet_mode {
            let dirty = buffer_dirty(&state.bulk_edited_metadata, &docs);
            state.apply(EditAction::SetHasChanges(dirty));
        }
    }

    /// The shadow collection.
    pub fn documents(&self) -> Vec<Document> {
        lock(&self.documents).clone()
    }

    pub fn document(&self, id: DocumentId) -> Option<Document> {
        lock(&self.documents).iter().find(|d| d.id == id).cloned()
    }

    pub fn state(&self) -> EditState {
        lock(&self.state).clone()
    }

    pub fn field_errors(&self) -> FieldErrors {
        lock(&self.state).field_errors.clone()
    }

    /// Buffered spreadsheet value of one cell.
    pub fn bulk_value(&self, document_id: DocumentId, field_id: &str) -> Option<MetadataValue> {
        lock(&self.state)
            .bulk_edited_metadata
            .get(&document_id)
            .and_then(|row| row.get(field_id))
            .cloned()
    }

    fn dispatch(&self, action: EditAction) {
        lock(&self.state).apply(action);
    }

    // ─── Single document ──────────────────────────────────────────────────

    /// Open `document` for editing, or cancel the open edit with `None`.
    ///
    /// Opening a different document replaces the current edit without
    /// saving it. Fails with [`Error::InvalidState`] while spreadsheet mode
    /// is active.
    pub fn begin_edit(&self, document: Option<&Document>) -> Result<()> {
        let Some(document) = document else {
            self.dispatch(EditAction::CancelEdit);
            debug!(component = "metadata", "Single edit cancelled");
            return Ok(());
        };

        let values = seed_values(&self.fields(), document);
        {
            let mut state = lock(&self.state);
            if !state.is_spreadsheet_mode {
                state.apply(EditAction::BeginEdit {
                    document: document.clone(),
                    values,
                });
                debug!(component = "metadata", document_id = document.id, "Single edit started");
                return Ok(());
            }
        }
        self.notices
            .warning("Exit spreadsheet mode before editing a single document.");
        Err(Error::InvalidState(
            "cannot edit a single document while spreadsheet mode is active".to_string(),
        ))
    }

    pub fn cancel_edit(&self) {
        self.dispatch(EditAction::CancelEdit);
    }

    /// Set a pending value on the open document. Ignored when nothing is
    /// being edited.
    pub fn update_field(&self, field_id: impl Into<String>, value: impl Into<MetadataValue>) {
        let mut state = lock(&self.state);
        if !state.is_editing() {
            return;
        }
        state.apply(EditAction::UpdateField {
            field_id: field_id.into(),
            value: value.into(),
        });
    }

    /// Whether any pending value differs from the open document.
    pub fn has_changed(&self) -> bool {
        let state = lock(&self.state);
        state
            .editing_document
            .as_ref()
            .is_some_and(|doc| is_dirty(&state.edited_values, doc))
    }

    /// Save the open document.
    ///
    /// Issues a metadata patch and an excerpt update concurrently, each only
    /// when its part changed. On failure the edit stays open with the
    /// user's values; parts that did save are kept.
    pub async fn save_single(&self) -> SaveOutcome {
        let (document, diff) = {
            let mut state = lock(&self.state);
            let Some(document) = state.editing_document.clone() else {
                return SaveOutcome::Skipped(SkipReason::NotEditing);
            };
            if state.is_saving_single {
                return SaveOutcome::Skipped(SkipReason::SaveInProgress);
            }
            let diff = diff_row(&state.edited_values, &document);
            if diff.is_empty() {
                state.apply(EditAction::CancelEdit);
                return SaveOutcome::Unchanged;
            }
            state.apply(EditAction::SetSavingSingle(true));
            (document, diff)
        };
        let _saving = OnDrop::new(|| self.dispatch(EditAction::SetSavingSingle(false)));

        let id = document.id;
        let started = Instant::now();
        debug!(
            component = "metadata",
            op = "save_single",
            document_id = id,
            field_count = diff.metadata.len(),
            call_count = diff.call_count(),
            "Saving document"
        );

        let (metadata, core) = self.issue(id, &diff).await;
        let metadata_ok = metadata.as_ref().is_some_and(|r| r.is_ok());
        let core_ok = core.as_ref().is_some_and(|r| r.is_ok());
        let error = [metadata, core]
            .into_iter()
            .flatten()
            .find_map(|r| r.err());

        let Some(error) = error else {
            self.replace_document(diff.apply_to(&document));
            self.dispatch(EditAction::CancelEdit);
            self.publish(vec![id]);
            info!(
                component = "metadata",
                op = "save_single",
                document_id = id,
                duration_ms = started.elapsed().as_millis() as u64,
                "Document metadata saved"
            );
            self.notices.success("Document metadata updated successfully");
            return SaveOutcome::Saved {
                document_ids: vec![id],
            };
        };

        let committed = RowDiff {
            metadata: if metadata_ok {
                diff.metadata.clone()
            } else {
                MetadataMap::new()
            },
            excerpt: if core_ok { diff.excerpt.clone() } else { None },
        };
        if !committed.is_empty() {
            let updated = committed.apply_to(&document);
            self.replace_document(updated.clone());
            self.dispatch(EditAction::SetEditingDocument(updated));
            self.publish(vec![id]);
        }
        if let Some(field_errors) = error.field_errors() {
            self.dispatch(EditAction::SetFieldErrors(field_errors.clone()));
        }
        let message = error
            .user_message()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Failed to update metadata")
            .to_string();
        self.errors.report(
            OperationKind::Metadata,
            Some(id),
            &error,
            ReportOptions::new().with_message(message),
        );
        SaveOutcome::Failed(error)
    }

    // ─── Spreadsheet mode ─────────────────────────────────────────────────

    /// Snapshot every document into the bulk buffer.
    ///
    /// Fails with [`Error::InvalidState`] while a single document is open;
    /// neither buffer changes. Entering again while active keeps the
    /// existing buffer.
    pub fn enter_spreadsheet_mode(&self) -> Result<()> {
        let fields = self.fields();
        let buffer: BTreeMap<DocumentId, MetadataMap> = self
            .documents()
            .iter()
            .map(|doc| (doc.id, seed_values(&fields, doc)))
            .collect();

        {
            let mut state = lock(&self.state);
            if state.is_spreadsheet_mode {
                return Ok(());
            }
            if !state.is_editing() {
                debug!(component = "metadata", document_count = buffer.len(), "Spreadsheet mode entered");
                state.apply(EditAction::EnterSpreadsheet { buffer });
                return Ok(());
            }
        }
        self.notices
            .warning("Finish or cancel the open document edit before entering spreadsheet mode.");
        Err(Error::InvalidState(
            "cannot enter spreadsheet mode while a document is being edited".to_string(),
        ))
    }

    /// Leave spreadsheet mode, discarding the buffer.
    pub fn exit_spreadsheet_mode(&self) {
        debug!(component = "metadata", "Spreadsheet mode exited");
        self.dispatch(EditAction::ExitSpreadsheet);
    }

    /// Set one buffered cell, then recompute whether any row differs from
    /// the shadow collection.
    pub fn update_bulk_field(
        &self,
        document_id: DocumentId,
        field_id: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Result<()> {
        let docs = self.documents();
        let seed = docs
            .iter()
            .find(|d| d.id == document_id)
            .map(|doc| seed_values(&self.fields(), doc))
            .unwrap_or_default();

        let mut state = lock(&self.state);
        if !state.is_spreadsheet_mode {
            return Err(Error::InvalidState(
                "spreadsheet mode is not active".to_string(),
            ));
        }
        state.apply(EditAction::UpdateBulkField {
            document_id,
            field_id: field_id.into(),
            value: value.into(),
            seed,
        });
        let dirty = buffer_dirty(&state.bulk_edited_metadata, &docs);
        state.apply(EditAction::SetHasChanges(dirty));
        Ok(())
    }

    /// Save every buffered row that differs from the shadow collection.
    pub async fn save_bulk(&self) -> SaveOutcome {
        self.save_rows(None).await
    }

    /// Re-save one document: its spreadsheet row when buffered, else the
    /// open single edit when it is that document.
    pub async fn retry_metadata(&self, document_id: DocumentId) -> SaveOutcome {
        let (in_buffer, is_open) = {
            let state = lock(&self.state);
            (
                state.is_spreadsheet_mode && state.bulk_edited_metadata.contains_key(&document_id),
                state
                    .editing_document
                    .as_ref()
                    .is_some_and(|d| d.id == document_id),
            )
        };
        if in_buffer {
            self.save_rows(Some(document_id)).await
        } else if is_open {
            self.save_single().await
        } else {
            debug!(component = "metadata", document_id, "Nothing buffered to retry");
            SaveOutcome::Skipped(SkipReason::NotEditing)
        }
    }

    async fn save_rows(&self, only: Option<DocumentId>) -> SaveOutcome {
        let started = Instant::now();
        let docs = self.documents();
        let rows: Vec<(Document, RowDiff)> = {
            let mut state = lock(&self.state);
            if !state.is_spreadsheet_mode {
                return SaveOutcome::Skipped(SkipReason::NotInSpreadsheetMode);
            }
            if state.is_saving_bulk {
                return SaveOutcome::Skipped(SkipReason::SaveInProgress);
            }
            let rows: Vec<_> = state
                .bulk_edited_metadata
                .iter()
                .filter(|(id, _)| only.map_or(true, |wanted| wanted == **id))
                .filter_map(|(id, buffer)| {
                    let doc = docs.iter().find(|d| d.id == *id)?;
                    let diff = diff_row(buffer, doc);
                    (!diff.is_empty()).then(|| (doc.clone(), diff))
                })
                .collect();
            if rows.is_empty() {
                return SaveOutcome::Unchanged;
            }
            state.apply(EditAction::SetSavingBulk(true));
            rows
        };
        let _saving = OnDrop::new(|| self.dispatch(EditAction::SetSavingBulk(false)));

        let attempted = rows.len();
        debug!(
            component = "metadata",
            op = "save_bulk",
            document_count = attempted,
            call_count = rows.iter().map(|(_, diff)| diff.call_count()).sum::<usize>(),
            "Saving spreadsheet rows"
        );

        let results = join_all(rows.iter().map(|(doc, diff)| async move {
            (doc.id, self.issue(doc.id, diff).await)
        }))
        .await;

        let fields = self.fields();
        let mut saved = Vec::new();
        let mut failed = Vec::new();
        let mut reconciled = Vec::new();
        let mut reseed = BTreeMap::new();
        let mut row_errors: BTreeMap<DocumentId, FieldErrors> = BTreeMap::new();

        for (id, (metadata, core)) in results {
            let mut server: Option<Document> = None;
            let mut row_failures: Vec<(&str, Error)> = Vec::new();

            for (part, result) in [("metadata", metadata), ("excerpt", core)] {
                match result {
                    None => {}
                    Some(Ok(doc)) => {
                        server = Some(match server.take() {
                            // The metadata response is the base; the excerpt
                            // comes from the core update.
                            Some(mut base) => {
                                base.excerpt = doc.excerpt;
                                base
                            }
                            None => doc,
                        });
                    }
                    Some(Err(e)) => {
                        if let Some(field_errors) = e.field_errors() {
                            row_errors
                                .entry(id)
                                .or_default()
                                .extend(field_errors.clone());
                        }
                        row_failures.push((part, e));
                    }
                }
            }

            let row_failed = !row_failures.is_empty();
            if let Some((_, first)) = row_failures.first() {
                // One queue entry per document; a replay re-sends the whole row.
                let parts: Vec<&str> = row_failures.iter().map(|(part, _)| *part).collect();
                self.errors.report(
                    OperationKind::Metadata,
                    Some(id),
                    first,
                    ReportOptions::new().silent().with_message(format!(
                        "Error updating {} for document {}: {}",
                        parts.join(" and "),
                        id,
                        error_detail(first)
                    )),
                );
            }

            if let Some(doc) = server {
                if !row_failed {
                    saved.push(id);
                    reseed.insert(id, seed_values(&fields, &doc));
                }
                reconciled.push(doc);
            }
            if row_failed {
                failed.push(id);
            }
        }

        let changed: Vec<DocumentId> = reconciled.iter().map(|d| d.id).collect();
        for doc in reconciled {
            self.replace_document(doc);
        }
        let docs = self.documents();

        let still_dirty = {
            let mut state = lock(&self.state);
            if state.is_spreadsheet_mode {
                state.apply(EditAction::ReseedRows(reseed));
                let mut errors = state.bulk_field_errors.clone();
                errors.extend(row_errors);
                state.apply(EditAction::SetBulkFieldErrors(errors));
                let dirty = buffer_dirty(&state.bulk_edited_metadata, &docs);
                state.apply(EditAction::SetHasChanges(dirty));
                dirty
            } else {
                false
            }
        };

        if !changed.is_empty() {
            self.publish(changed);
        }

        info!(
            component = "metadata",
            op = "save_bulk",
            document_count = attempted,
            failed_count = failed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Spreadsheet save finished"
        );

        if !failed.is_empty() {
            self.notices.persistent(
                NoticeLevel::Warning,
                format!(
                    "{} of {} metadata updates failed. You can retry the failed operations.",
                    failed.len(),
                    attempted
                ),
            );
            return SaveOutcome::Partial {
                saved,
                failed,
                attempted,
            };
        }

        if only.is_none() || !still_dirty {
            self.notices.success("All metadata changes saved successfully.");
            self.dispatch(EditAction::ExitSpreadsheet);
        } else {
            self.notices.success("Document metadata updated successfully");
        }
        SaveOutcome::Saved {
            document_ids: saved,
        }
    }

    /// Issue the calls a diff needs, concurrently.
    async fn issue(&self, id: DocumentId, diff: &RowDiff) -> CallResults {
        let metadata = async {
            if diff.metadata.is_empty() {
                None
            } else {
                Some(
                    self.api
                        .patch_document_metadata(id, diff.metadata.clone())
                        .await,
                )
            }
        };
        let core = async {
            match &diff.excerpt {
                Some(excerpt) => Some(
                    self.api
                        .update_document_core(id, CoreUpdate::excerpt(excerpt.clone()))
                        .await,
                ),
                None => None,
            }
        };
        futures::join!(metadata, core)
    }

    /// Swap one shadow record for `document`, matched by id.
    fn replace_document(&self, document: Document) {
        let mut documents = lock(&self.documents);
        if let Some(slot) = documents.iter_mut().find(|d| d.id == document.id) {
            *slot = document;
        }
    }

    fn publish(&self, changed_ids: Vec<DocumentId>) {
        self.bus.emit(RepositoryEvent::DocumentsUpdated {
            changed_ids,
            documents: self.documents(),
        });
    }
}

/// Whether any buffered row differs from its shadow document. Rows whose
/// document left the collection never count.
fn buffer_dirty(buffer: &BTreeMap<DocumentId, MetadataMap>, documents: &[Document]) -> bool {
    buffer.iter().any(|(id, values)| {
        documents
            .iter()
            .find(|d| d.id == *id)
            .is_some_and(|doc| is_dirty(values, doc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_core::mock::{ApiOperation, MockDocumentApi};
    use docrepo_core::EXCERPT_FIELD;

    fn engine(api: &MockDocumentApi) -> (MetadataEngine, NotificationService, Arc<ErrorHandler>) {
        let bus = Arc::new(EventBus::new(64));
        let notices = NotificationService::new(bus.clone(), 5_000);
        let errors = Arc::new(ErrorHandler::new(notices.clone(), bus.clone()));
        let engine = MetadataEngine::new(Arc::new(api.clone()), notices.clone(), errors.clone(), bus)
            .with_fields(vec![
                MetadataField::taxonomy("category", "Category", ["Policy", "Guideline"]),
                MetadataField::text("author", "Author").with_order(1),
            ])
            .with_documents(vec![
                Document::new(1, "One").with_meta("category", "Policy"),
                Document::new(2, "Two").with_excerpt("Summary"),
            ]);
        (engine, notices, errors)
    }

    fn api() -> MockDocumentApi {
        MockDocumentApi::new()
            .with_fields([
                MetadataField::taxonomy("category", "Category", ["Policy", "Guideline"]),
                MetadataField::text("author", "Author"),
            ])
            .with_documents([
                Document::new(1, "One").with_meta("category", "Policy"),
                Document::new(2, "Two").with_excerpt("Summary"),
            ])
    }

    #[test]
    fn test_begin_edit_seeds_every_field() {
        let api = api();
        let (engine, _, _) = engine(&api);
        let doc = engine.document(1).unwrap();
        engine.begin_edit(Some(&doc)).unwrap();

        let state = engine.state();
        assert_eq!(state.edited_values.len(), 3);
        assert_eq!(state.edited_values["author"], MetadataValue::from(""));
        assert_eq!(state.edited_values[EXCERPT_FIELD], MetadataValue::from(""));
        assert!(!engine.has_changed());

        engine.update_field("author", "Jane");
        assert!(engine.has_changed());
        engine.update_field("author", "");
        assert!(!engine.has_changed());
    }

    #[test]
    fn test_begin_edit_replaces_without_saving() {
        let api = api();
        let (engine, _, _) = engine(&api);
        engine.begin_edit(engine.document(1).as_ref()).unwrap();
        engine.update_field("author", "Jane");
        engine.begin_edit(engine.document(2).as_ref()).unwrap();

        let state = engine.state();
        assert_eq!(state.editing_document.unwrap().id, 2);
        assert_eq!(state.edited_values["author"], MetadataValue::from(""));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_single_with_no_changes_makes_no_calls() {
        let api = api();
        let (engine, _, _) = engine(&api);
        engine.begin_edit(engine.document(1).as_ref()).unwrap();
        assert_eq!(engine.save_single().await, SaveOutcome::Unchanged);
        assert!(api.calls().is_empty());
        assert!(!engine.state().is_editing());
    }

    #[tokio::test]
    async fn test_save_single_without_edit_is_skipped() {
        let api = api();
        let (engine, _, _) = engine(&api);
        assert_eq!(
            engine.save_single().await,
            SaveOutcome::Skipped(SkipReason::NotEditing)
        );
    }

    #[tokio::test]
    async fn test_save_single_validation_error_keeps_edit() {
        let api = api();
        let (engine, notices, errors) = engine(&api);
        engine.begin_edit(engine.document(1).as_ref()).unwrap();
        engine.update_field("category", "Memo");

        let outcome = engine.save_single().await;
        assert!(matches!(outcome, SaveOutcome::Failed(Error::Validation { .. })));

        let state = engine.state();
        assert!(state.is_editing());
        assert_eq!(state.edited_values["category"], MetadataValue::from("Memo"));
        assert!(state.field_errors.contains_key("category"));
        assert!(!state.is_saving_single);
        assert_eq!(errors.queued(), 1);
        assert_eq!(notices.notices()[0].message, "Invalid metadata");
        // Shadow untouched
        assert_eq!(
            engine.document(1).unwrap().meta("category"),
            Some(&MetadataValue::from("Policy"))
        );
    }

    #[tokio::test]
    async fn test_save_single_partial_commit_keeps_saved_half() {
        let api = api().fail_on(
            ApiOperation::UpdateCore,
            Some(1),
            Error::Server {
                status: 502,
                message: None,
            },
        );
        let (engine, notices, _) = engine(&api);
        engine.begin_edit(engine.document(1).as_ref()).unwrap();
        engine.update_field("author", "Jane");
        engine.update_field(EXCERPT_FIELD, "New");

        assert!(matches!(engine.save_single().await, SaveOutcome::Failed(_)));
        let shadow = engine.document(1).unwrap();
        assert_eq!(shadow.meta("author"), Some(&MetadataValue::from("Jane")));
        assert_eq!(shadow.excerpt, None);
        assert_eq!(notices.notices()[0].message, "Failed to update metadata");

        // Only the excerpt is still pending
        api.clear_failures();
        api.clear_calls();
        assert!(engine.save_single().await.is_success());
        assert_eq!(api.call_count(ApiOperation::PatchMetadata), 0);
        assert_eq!(api.call_count(ApiOperation::UpdateCore), 1);
    }

    #[test]
    fn test_update_bulk_field_outside_mode_is_rejected() {
        let api = api();
        let (engine, _, _) = engine(&api);
        assert!(matches!(
            engine.update_bulk_field(1, "author", "x"),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_revert_flips_dirty_flag_back() {
        let api = api();
        let (engine, _, _) = engine(&api);
        engine.enter_spreadsheet_mode().unwrap();
        assert!(!engine.state().has_metadata_changes);

        engine.update_bulk_field(1, "category", "Guideline").unwrap();
        engine.update_bulk_field(2, EXCERPT_FIELD, "Changed").unwrap();
        assert!(engine.state().has_metadata_changes);

        engine.update_bulk_field(1, "category", "Policy").unwrap();
        assert!(engine.state().has_metadata_changes);
        engine.update_bulk_field(2, EXCERPT_FIELD, "Summary").unwrap();
        assert!(!engine.state().has_metadata_changes);
    }

    #[tokio::test]
    async fn test_bulk_save_writes_back_server_values() {
        let api = api();
        let (engine, notices, _) = engine(&api);
        engine.enter_spreadsheet_mode().unwrap();
        engine.update_bulk_field(1, "category", "guideline").unwrap();

        let outcome = engine.save_bulk().await;
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                document_ids: vec![1]
            }
        );
        // Canonical name from the server, not the typed value
        assert_eq!(
            engine.document(1).unwrap().meta("category"),
            Some(&MetadataValue::from("Guideline"))
        );
        let state = engine.state();
        assert!(!state.is_spreadsheet_mode);
        assert!(state.bulk_edited_metadata.is_empty());
        assert_eq!(notices.notices()[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_retry_metadata_saves_one_row() {
        let api = api().fail_on(ApiOperation::PatchMetadata, Some(2), Error::Request("offline".into()));
        let (engine, _, errors) = engine(&api);
        engine.enter_spreadsheet_mode().unwrap();
        engine.update_bulk_field(1, "author", "Ann").unwrap();
        engine.update_bulk_field(2, "author", "Bob").unwrap();

        let outcome = engine.save_bulk().await;
        assert!(matches!(outcome, SaveOutcome::Partial { .. }));
        assert_eq!(errors.queued(), 1);
        assert!(engine.state().is_spreadsheet_mode);

        api.clear_failures();
        api.clear_calls();
        let retried = engine.retry_metadata(2).await;
        assert_eq!(
            retried,
            SaveOutcome::Saved {
                document_ids: vec![2]
            }
        );
        assert_eq!(api.called_ids(ApiOperation::PatchMetadata), vec![2]);
        assert!(!engine.state().is_spreadsheet_mode);
    }

    #[tokio::test]
    async fn test_retry_metadata_without_buffer_is_skipped() {
        let api = api();
        let (engine, _, _) = engine(&api);
        assert_eq!(
            engine.retry_metadata(1).await,
            SaveOutcome::Skipped(SkipReason::NotEditing)
        );
    }
}
