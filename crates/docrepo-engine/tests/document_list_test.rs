/// Integration tests for the document list orchestrator.
///
/// Covers how the list view dispatches lifecycle calls, reloads after
/// changes, adopts the engine's shadow collection and replays the retry
/// queue.
use std::sync::Arc;

use docrepo_core::mock::{ApiOperation, MockDocumentApi};
use docrepo_core::{
    Document, DocumentStatus, Error, MetadataField, MetadataValue, RepositoryConfig,
    StatusFilter, UploadFile, EXCERPT_FIELD,
};
use docrepo_engine::{DocumentListOrchestrator, LifecycleOutcome, OperationKind, SaveOutcome};

fn api() -> MockDocumentApi {
    MockDocumentApi::new()
        .with_fields([
            MetadataField::taxonomy("category", "Category", ["Policy", "Guideline"]),
            MetadataField::text("owner", "Owner").with_order(1),
        ])
        .with_documents([
            Document::new(1, "Alpha").with_meta("category", "Policy"),
            Document::new(2, "Beta"),
            Document::new(3, "Gamma"),
            Document::new(4, "Old draft").with_status(DocumentStatus::Trashed),
            Document::new(5, "Old memo").with_status(DocumentStatus::Trashed),
        ])
}

async fn loaded(api: &MockDocumentApi) -> DocumentListOrchestrator {
    let list =
        DocumentListOrchestrator::new(Arc::new(api.clone()), RepositoryConfig::default()).unwrap();
    list.load_fields().await.unwrap();
    list.refresh().await.unwrap();
    api.clear_calls();
    list
}

#[tokio::test]
async fn test_delete_in_all_view_moves_to_trash() {
    let api = api();
    let list = loaded(&api).await;

    let outcome = list.delete_document(2).await;

    assert!(outcome.is_completed());
    assert_eq!(api.called_ids(ApiOperation::Trash), vec![2]);
    assert_eq!(api.call_count(ApiOperation::PermanentDelete), 0);
    assert_eq!(
        api.document(2).map(|d| d.status),
        Some(DocumentStatus::Trashed)
    );
    // Reloaded page and counts
    assert_eq!(list.documents().len(), 2);
    assert_eq!(list.counts().trashed(), 3);
}

#[tokio::test]
async fn test_delete_in_trash_view_deletes_permanently() {
    let api = api();
    let list = loaded(&api).await;
    list.change_filter(StatusFilter::Trash).await.unwrap();
    api.clear_calls();

    let outcome = list.delete_document(4).await;

    assert!(outcome.is_completed());
    assert_eq!(api.called_ids(ApiOperation::PermanentDelete), vec![4]);
    assert_eq!(api.call_count(ApiOperation::Trash), 0);
    assert!(api.document(4).is_none());
    assert_eq!(list.documents().len(), 1);
}

#[tokio::test]
async fn test_bulk_trash_clears_selection() {
    let api = api();
    let list = loaded(&api).await;
    list.select_all(true);
    list.lifecycle().open_bulk_delete();

    let outcome = list.delete_selected().await;

    assert_eq!(
        outcome,
        LifecycleOutcome::Completed {
            document_ids: vec![1, 2, 3]
        }
    );
    assert!(list.selected().is_empty());
    assert!(!list.lifecycle().state().bulk_delete_open);
    assert!(list.documents().is_empty());
    assert_eq!(list.toolbar().all_label, "All (0)");
}

#[tokio::test]
async fn test_bulk_restore_is_all_or_nothing() {
    let api = api();
    let list = loaded(&api).await;
    list.change_filter(StatusFilter::Trash).await.unwrap();
    api.set_failure(
        ApiOperation::Restore,
        Some(5),
        Error::Server {
            status: 500,
            message: None,
        },
    );
    list.select_all(true);
    list.lifecycle().open_bulk_restore();

    let outcome = list.restore_selected().await;

    assert!(matches!(outcome, LifecycleOutcome::Failed(_)));
    assert!(!list.lifecycle().state().bulk_restore_open);
    assert_eq!(list.selected(), vec![4, 5]);
    assert_eq!(
        list.notices().notices()[0].message,
        "Error restoring one or more documents."
    );
}

#[tokio::test]
async fn test_saves_are_adopted_into_the_list() {
    let api = api();
    let list = loaded(&api).await;
    list.toggle_spreadsheet_mode().unwrap();
    list.engine().update_bulk_field(3, "category", "guideline").unwrap();
    assert_eq!(list.toolbar().save_button, Some("Save Changes"));

    assert!(list.save_bulk().await.is_success());

    let doc = list.documents().into_iter().find(|d| d.id == 3).unwrap();
    assert_eq!(doc.meta("category"), Some(&MetadataValue::from("Guideline")));
    assert_eq!(list.toolbar().spreadsheet_toggle, "Enter Spreadsheet Mode");
    assert_eq!(list.toolbar().save_button, None);
    // No reload after a metadata save
    assert_eq!(api.call_count(ApiOperation::ListDocuments), 0);
}

#[tokio::test]
async fn test_retry_all_replays_failed_metadata_row() {
    let api = api();
    let list = loaded(&api).await;
    api.set_failure(
        ApiOperation::PatchMetadata,
        Some(2),
        Error::Request("offline".into()),
    );
    list.toggle_spreadsheet_mode().unwrap();
    list.engine().update_bulk_field(1, "owner", "Ann").unwrap();
    list.engine().update_bulk_field(2, "owner", "Bob").unwrap();

    let outcome = list.save_bulk().await;
    assert!(matches!(outcome, SaveOutcome::Partial { .. }));
    let queued = list.errors().failed_operations();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind, OperationKind::Metadata);
    assert_eq!(queued[0].subject_id, Some(2));

    api.clear_failures();
    let report = list.retry_all().await;

    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(list.errors().queued(), 0);
    let doc = list.documents().into_iter().find(|d| d.id == 2).unwrap();
    assert_eq!(doc.meta("owner"), Some(&MetadataValue::from("Bob")));
    assert!(!list.engine().state().is_spreadsheet_mode);
}

#[tokio::test]
async fn test_row_with_both_calls_failing_is_queued_once() {
    let api = api();
    let list = loaded(&api).await;
    let offline = Error::Request("offline".into());
    api.set_failure(ApiOperation::PatchMetadata, Some(2), offline.clone());
    api.set_failure(ApiOperation::UpdateCore, Some(2), offline);
    list.toggle_spreadsheet_mode().unwrap();
    list.engine().update_bulk_field(2, "owner", "Bob").unwrap();
    list.engine()
        .update_bulk_field(2, EXCERPT_FIELD, "Short summary")
        .unwrap();

    let outcome = list.save_bulk().await;
    assert_eq!(
        outcome,
        SaveOutcome::Partial {
            saved: vec![],
            failed: vec![2],
            attempted: 1,
        }
    );
    assert_eq!(
        list.notices().notices()[0].message,
        "1 of 1 metadata updates failed. You can retry the failed operations."
    );
    let queued = list.errors().failed_operations();
    assert_eq!(queued.len(), 1);
    assert_eq!(
        queued[0].user_message,
        "Error updating metadata and excerpt for document 2: Request error: offline"
    );

    let mut sizes = vec![list.errors().queued()];
    for _ in 0..3 {
        let report = list.retry_all().await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 1);
        sizes.push(list.errors().queued());
    }
    assert_eq!(sizes, vec![1, 1, 1, 1]);
    assert_eq!(api.called_ids(ApiOperation::PatchMetadata), vec![2, 2, 2, 2]);
    assert_eq!(api.called_ids(ApiOperation::UpdateCore), vec![2, 2, 2, 2]);

    api.clear_failures();
    let report = list.retry_all().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(list.errors().queued(), 0);
    let doc = list.documents().into_iter().find(|d| d.id == 2).unwrap();
    assert_eq!(doc.meta("owner"), Some(&MetadataValue::from("Bob")));
    assert_eq!(doc.excerpt.as_deref(), Some("Short summary"));
}

#[tokio::test]
async fn test_retry_of_an_already_saved_row_succeeds() {
    let api = api();
    let list = loaded(&api).await;
    api.set_failure(
        ApiOperation::PatchMetadata,
        Some(2),
        Error::Request("offline".into()),
    );
    list.toggle_spreadsheet_mode().unwrap();
    list.engine().update_bulk_field(2, "owner", "Bob").unwrap();
    assert!(matches!(list.save_bulk().await, SaveOutcome::Partial { .. }));
    assert_eq!(list.errors().queued(), 1);

    // The user saves again before retrying; the queued entry has nothing left
    api.clear_failures();
    assert!(list.save_bulk().await.is_success());
    assert!(!list.engine().state().is_spreadsheet_mode);

    let report = list.retry_all().await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(list.errors().queued(), 0);
    assert_eq!(api.called_ids(ApiOperation::PatchMetadata), vec![2, 2]);
}

#[tokio::test]
async fn test_retry_all_requeues_a_failing_delete_once() {
    let api = api();
    let list = loaded(&api).await;
    api.set_failure(
        ApiOperation::Trash,
        Some(1),
        Error::Server {
            status: 503,
            message: None,
        },
    );
    assert!(matches!(
        list.delete_document(1).await,
        LifecycleOutcome::Failed(_)
    ));
    assert_eq!(list.errors().queued(), 1);

    let report = list.retry_all().await;
    assert_eq!(report.failed, 1);
    assert_eq!(list.errors().queued(), 1);

    api.clear_failures();
    let report = list.retry_all().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(list.errors().queued(), 0);
    assert_eq!(api.called_ids(ApiOperation::Trash), vec![1, 1, 1]);
    assert!(list.documents().iter().all(|d| d.id != 1));
}

#[tokio::test]
async fn test_upload_reloads_the_page() {
    let api = api();
    let list = loaded(&api).await;

    let created = list
        .upload_files(
            vec![UploadFile::new("Report.pdf", "application/pdf", vec![1, 2, 3])],
            None,
        )
        .await;

    assert_eq!(created.len(), 1);
    assert_eq!(list.documents()[0].id, created[0].id);
    assert_eq!(list.documents()[0].title, "Report");
    assert_eq!(list.counts().total_active(), 4);
}

#[tokio::test]
async fn test_page_past_end_falls_back_to_last_page() {
    let api = api();
    let list = DocumentListOrchestrator::new(
        Arc::new(api.clone()),
        RepositoryConfig::default().with_page_size(2),
    )
    .unwrap();
    list.load_page(2).await.unwrap();
    assert_eq!(list.total_pages(), 2);
    assert_eq!(list.documents().len(), 1);

    // Removing the only document on page 2 sends the view back to page 1
    assert!(list.delete_document(1).await.is_completed());
    assert_eq!(list.current_page(), 1);
    assert_eq!(list.documents().len(), 2);
}
