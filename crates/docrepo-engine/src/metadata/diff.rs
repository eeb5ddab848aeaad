//! Change detection between edit buffers and documents.
//!
//! Values are compared by their coerced string form: a missing value equals
//! the empty string and term lists compare as their comma-joined names.

use docrepo_core::{
    coerce_value, Document, MetadataField, MetadataMap, MetadataValue, EXCERPT_FIELD,
};
use tracing::trace;

/// Changes of one document, split by the call that saves them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowDiff {
    /// Changed metadata fields with their new values. Never holds the excerpt.
    pub metadata: MetadataMap,
    /// New excerpt, when it changed.
    pub excerpt: Option<String>,
}

impl RowDiff {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.excerpt.is_none()
    }

    /// Number of external calls needed to save this diff.
    pub fn call_count(&self) -> usize {
        usize::from(!self.metadata.is_empty()) + usize::from(self.excerpt.is_some())
    }

    /// `document` with the diffed values written over it.
    pub fn apply_to(&self, document: &Document) -> Document {
        let mut updated = document.clone();
        for (field_id, value) in &self.metadata {
            updated.metadata.insert(field_id.clone(), value.clone());
        }
        if let Some(excerpt) = &self.excerpt {
            updated.excerpt = Some(excerpt.clone());
        }
        updated
    }
}

/// Buffer snapshot of a document: every configured field (missing values
/// become empty text) plus the excerpt.
pub fn seed_values(fields: &[MetadataField], document: &Document) -> MetadataMap {
    let mut values: MetadataMap = fields
        .iter()
        .map(|field| {
            (
                field.id.clone(),
                document.meta(&field.id).cloned().unwrap_or_default(),
            )
        })
        .collect();
    values.insert(
        EXCERPT_FIELD.to_string(),
        MetadataValue::from(document.excerpt_text()),
    );
    values
}

/// Diff a buffer against a document. Only keys present in the buffer are
/// compared.
pub fn diff_row(buffer: &MetadataMap, document: &Document) -> RowDiff {
    let mut diff = RowDiff::default();
    for (field_id, value) in buffer {
        if field_id == EXCERPT_FIELD {
            let excerpt = value.coerce();
            if excerpt != document.excerpt_text() {
                diff.excerpt = Some(excerpt);
            }
            continue;
        }
        let changed = value.coerce() != coerce_value(document.meta(field_id));
        trace!(document_id = document.id, field_id = %field_id, changed, "Compared field");
        if changed {
            diff.metadata.insert(field_id.clone(), value.clone());
        }
    }
    diff
}

pub fn is_dirty(buffer: &MetadataMap, document: &Document) -> bool {
    !diff_row(buffer, document).is_empty()
}
