//! The contract the engine consumes from the content platform.
//!
//! The engine never assumes a transport: a REST client, an RPC bridge and
//! the in-memory [`mock`](crate::mock) backend all implement [`DocumentApi`].

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

/// Request for listing documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListDocumentsRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub filter: StatusFilter,
}

impl ListDocumentsRequest {
    pub fn new(page: u32, page_size: u32, filter: StatusFilter) -> Self {
        Self {
            page,
            page_size,
            filter,
        }
    }
}

/// Document operations exposed by the content platform.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// List one page of documents matching the status filter.
    async fn list_documents(&self, req: ListDocumentsRequest) -> Result<DocumentPage>;

    /// Configured metadata fields, ordered by their `order` attribute.
    async fn get_metadata_fields(&self) -> Result<Vec<MetadataField>>;

    /// Partially update metadata. Only the supplied keys change.
    async fn patch_document_metadata(&self, id: DocumentId, changes: MetadataMap) -> Result<Document>;

    /// Update core attributes (currently the excerpt).
    async fn update_document_core(&self, id: DocumentId, update: CoreUpdate) -> Result<Document>;

    /// Move a document to the trash.
    async fn trash_document(&self, id: DocumentId) -> Result<()>;

    /// Bring a trashed document back.
    async fn restore_document(&self, id: DocumentId) -> Result<()>;

    /// Remove a trashed document for good.
    async fn permanently_delete_document(&self, id: DocumentId) -> Result<()>;

    /// Create a document from an uploaded file.
    async fn upload_document(
        &self,
        file: UploadFile,
        initial_metadata: Option<MetadataMap>,
    ) -> Result<Document>;

    /// Document counts keyed by status name.
    async fn get_status_counts(&self) -> Result<StatusCounts>;
}
