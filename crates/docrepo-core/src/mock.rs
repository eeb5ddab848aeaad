//! In-memory document API for deterministic testing.
//!
//! [`MockDocumentApi`] keeps documents and field definitions in memory and
//! behaves like the platform does: patches only touch supplied keys,
//! taxonomy values are stored under the option's canonical name, restoring
//! republishes a document and permanent deletion requires the trash.
//! Every call is logged so tests can assert exactly which requests fired.
//!
//! ## Usage
//!
//! ```rust
//! use docrepo_core::mock::{ApiOperation, MockDocumentApi};
//! use docrepo_core::{Document, DocumentApi, Error};
//!
//! # tokio_test_block(async {
//! let api = MockDocumentApi::new()
//!     .with_documents([Document::new(1, "Budget")])
//!     .fail_on(ApiOperation::Trash, Some(1), Error::Request("offline".into()));
//!
//! assert!(api.trash_document(1).await.is_err());
//! assert_eq!(api.call_count(ApiOperation::Trash), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f);
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::fields::sort_fields;
use crate::models::*;
use crate::traits::{DocumentApi, ListDocumentsRequest};

/// Operations of the [`DocumentApi`] contract, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    ListDocuments,
    GetMetadataFields,
    PatchMetadata,
    UpdateCore,
    Trash,
    Restore,
    PermanentDelete,
    Upload,
    GetStatusCounts,
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: ApiOperation,
    pub document_id: Option<DocumentId>,
    pub payload: Option<JsonValue>,
}

#[derive(Debug, Default)]
struct Store {
    documents: BTreeMap<DocumentId, Document>,
    fields: Vec<MetadataField>,
    next_id: DocumentId,
}

/// Mock document API for testing.
#[derive(Clone)]
pub struct MockDocumentApi {
    store: Arc<Mutex<Store>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    failures: Arc<Mutex<HashMap<(ApiOperation, Option<DocumentId>), Error>>>,
    latency: Duration,
    gate: Arc<watch::Sender<bool>>,
}

impl Default for MockDocumentApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocumentApi {
    /// Create an empty mock.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            store: Arc::new(Mutex::new(Store {
                next_id: 1,
                ..Store::default()
            })),
            call_log: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            latency: Duration::ZERO,
            gate: Arc::new(gate),
        }
    }

    /// Seed documents.
    pub fn with_documents(self, documents: impl IntoIterator<Item = Document>) -> Self {
        {
            let mut store = self.store.lock().unwrap();
            for doc in documents {
                store.next_id = store.next_id.max(doc.id + 1);
                store.documents.insert(doc.id, doc);
            }
        }
        self
    }

    /// Seed field definitions.
    pub fn with_fields(self, fields: impl IntoIterator<Item = MetadataField>) -> Self {
        {
            let mut store = self.store.lock().unwrap();
            store.fields = fields.into_iter().collect();
            sort_fields(&mut store.fields);
        }
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `operation` fail with `error`. `document_id = None` applies to
    /// every document.
    pub fn fail_on(self, operation: ApiOperation, document_id: Option<DocumentId>, error: Error) -> Self {
        self.set_failure(operation, document_id, error);
        self
    }

    /// Same as [`fail_on`](Self::fail_on) on a shared handle.
    pub fn set_failure(&self, operation: ApiOperation, document_id: Option<DocumentId>, error: Error) {
        self.failures
            .lock()
            .unwrap()
            .insert((operation, document_id), error);
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Hold every subsequent call in flight until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.gate.send_replace(true);
    }

    pub fn resume(&self) {
        self.gate.send_replace(false);
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    /// Number of calls made for one operation.
    pub fn call_count(&self, operation: ApiOperation) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Document ids targeted by one operation, in call order.
    pub fn called_ids(&self, operation: ApiOperation) -> Vec<DocumentId> {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .filter_map(|c| c.document_id)
            .collect()
    }

    /// Current server-side copy of a document.
    pub fn document(&self, id: DocumentId) -> Option<Document> {
        self.store.lock().unwrap().documents.get(&id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.store.lock().unwrap().documents.len()
    }

    async fn enter(
        &self,
        operation: ApiOperation,
        document_id: Option<DocumentId>,
        payload: Option<JsonValue>,
    ) -> Result<()> {
        self.call_log.lock().unwrap().push(MockCall {
            operation,
            document_id,
            payload,
        });

        let mut gate = self.gate.subscribe();
        loop {
            let paused = *gate.borrow_and_update();
            if !paused || gate.changed().await.is_err() {
                break;
            }
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failures = self.failures.lock().unwrap();
        if let Some(err) = failures
            .get(&(operation, document_id))
            .or_else(|| failures.get(&(operation, None)))
        {
            return Err(err.clone());
        }
        Ok(())
    }
}

/// Validate and canonicalise incoming metadata against the field list.
fn canonicalize(fields: &[MetadataField], changes: MetadataMap) -> Result<MetadataMap> {
    let mut out = MetadataMap::new();
    let mut errors = BTreeMap::new();

    for (key, value) in changes {
        let Some(field) = fields.iter().find(|f| f.id == key) else {
            if RESERVED_FILE_KEYS.contains(&key.as_str()) {
                out.insert(key, value);
            } else {
                errors.insert(key.clone(), format!("Unknown metadata field: {}", key));
            }
            continue;
        };

        if field.field_type != FieldType::Taxonomy || value.is_empty() {
            out.insert(key, value);
            continue;
        }

        let names: Vec<String> = match &value {
            MetadataValue::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            MetadataValue::Terms(terms) => terms.clone(),
        };
        let mut canonical = Vec::with_capacity(names.len());
        for name in &names {
            match field.find_option(name) {
                Some(option) => canonical.push(option.name.clone()),
                None => {
                    errors.insert(key.clone(), format!("Invalid option for {}: {}", field.label, name));
                }
            }
        }
        let stored = if canonical.len() == 1 {
            MetadataValue::Text(canonical.remove(0))
        } else {
            MetadataValue::Terms(canonical)
        };
        out.insert(key, stored);
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(Error::Validation {
            message: "Invalid metadata".to_string(),
            field_errors: errors,
        })
    }
}

#[async_trait]
impl DocumentApi for MockDocumentApi {
    async fn list_documents(&self, req: ListDocumentsRequest) -> Result<DocumentPage> {
        self.enter(ApiOperation::ListDocuments, None, None).await?;
        let store = self.store.lock().unwrap();

        let matching: Vec<&Document> = store
            .documents
            .values()
            .rev()
            .filter(|d| req.filter.matches(d.status))
            .collect();
        let page_size = req.page_size.max(1) as usize;
        let total_count = matching.len() as u64;
        let total_pages = (matching.len().div_ceil(page_size)).max(1) as u32;
        let current_page = req.page.max(1);
        let documents = matching
            .into_iter()
            .skip((current_page as usize - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Ok(DocumentPage {
            documents,
            total_count,
            total_pages,
            current_page,
        })
    }

    async fn get_metadata_fields(&self) -> Result<Vec<MetadataField>> {
        self.enter(ApiOperation::GetMetadataFields, None, None).await?;
        Ok(self.store.lock().unwrap().fields.clone())
    }

    async fn patch_document_metadata(&self, id: DocumentId, changes: MetadataMap) -> Result<Document> {
        let payload = serde_json::to_value(&changes)?;
        self.enter(ApiOperation::PatchMetadata, Some(id), Some(payload))
            .await?;
        let mut store = self.store.lock().unwrap();
        let changes = canonicalize(&store.fields, changes)?;
        let doc = store
            .documents
            .get_mut(&id)
            .ok_or(Error::DocumentNotFound(id))?;
        for (key, value) in changes {
            if value.is_empty() {
                doc.metadata.remove(&key);
            } else {
                doc.metadata.insert(key, value);
            }
        }
        Ok(doc.clone())
    }

    async fn update_document_core(&self, id: DocumentId, update: CoreUpdate) -> Result<Document> {
        let payload = serde_json::to_value(&update)?;
        self.enter(ApiOperation::UpdateCore, Some(id), Some(payload))
            .await?;
        let mut store = self.store.lock().unwrap();
        let doc = store
            .documents
            .get_mut(&id)
            .ok_or(Error::DocumentNotFound(id))?;
        if let Some(excerpt) = update.excerpt {
            doc.excerpt = Some(excerpt.trim().to_string());
        }
        Ok(doc.clone())
    }

    async fn trash_document(&self, id: DocumentId) -> Result<()> {
        self.enter(ApiOperation::Trash, Some(id), None).await?;
        let mut store = self.store.lock().unwrap();
        let doc = store
            .documents
            .get_mut(&id)
            .ok_or(Error::DocumentNotFound(id))?;
        if doc.status.is_trashed() {
            return Err(Error::Server {
                status: 410,
                message: Some("The document has already been trashed.".to_string()),
            });
        }
        doc.status = DocumentStatus::Trashed;
        Ok(())
    }

    async fn restore_document(&self, id: DocumentId) -> Result<()> {
        self.enter(ApiOperation::Restore, Some(id), None).await?;
        let mut store = self.store.lock().unwrap();
        let doc = store
            .documents
            .get_mut(&id)
            .ok_or(Error::DocumentNotFound(id))?;
        if !doc.status.is_trashed() {
            return Err(Error::Server {
                status: 409,
                message: Some("The document is not in the trash.".to_string()),
            });
        }
        doc.status = DocumentStatus::Published;
        Ok(())
    }

    async fn permanently_delete_document(&self, id: DocumentId) -> Result<()> {
        self.enter(ApiOperation::PermanentDelete, Some(id), None)
            .await?;
        let mut store = self.store.lock().unwrap();
        match store.documents.get(&id) {
            None => Err(Error::DocumentNotFound(id)),
            Some(doc) if !doc.status.is_trashed() => Err(Error::Server {
                status: 409,
                message: Some("Documents must be trashed before they can be deleted.".to_string()),
            }),
            Some(_) => {
                store.documents.remove(&id);
                Ok(())
            }
        }
    }

    async fn upload_document(
        &self,
        file: UploadFile,
        initial_metadata: Option<MetadataMap>,
    ) -> Result<Document> {
        let payload = serde_json::json!({
            "name": file.name,
            "mime_type": file.mime_type,
            "size": file.size(),
        });
        self.enter(ApiOperation::Upload, None, Some(payload)).await?;
        let mut store = self.store.lock().unwrap();
        let metadata = canonicalize(&store.fields, initial_metadata.unwrap_or_default())?;

        let id = store.next_id;
        store.next_id += 1;
        let title = file
            .name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| file.name.clone());

        let mut doc = Document::new(id, title)
            .with_meta(FILE_ID_KEY, (id + 10_000).to_string())
            .with_meta(
                FILE_URL_KEY,
                format!("https://example.test/wp-content/uploads/documents/{}", file.name),
            )
            .with_meta(FILE_NAME_KEY, file.name.clone())
            .with_meta(FILE_TYPE_KEY, file.mime_type.clone())
            .with_meta(FILE_SIZE_KEY, file.size().to_string());
        doc.metadata.extend(metadata);
        store.documents.insert(id, doc.clone());
        Ok(doc)
    }

    async fn get_status_counts(&self) -> Result<StatusCounts> {
        self.enter(ApiOperation::GetStatusCounts, None, None).await?;
        let store = self.store.lock().unwrap();
        let mut counts = BTreeMap::new();
        for status in DocumentStatus::ACTIVE
            .iter()
            .chain(std::iter::once(&DocumentStatus::Trashed))
        {
            counts.insert(status.as_str().to_string(), 0);
        }
        for doc in store.documents.values() {
            *counts.entry(doc.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(StatusCounts(counts))
    }
}
