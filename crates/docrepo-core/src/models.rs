//! Core data models for the document repository.
//!
//! These types are shared by the core and engine crates and mirror the JSON
//! shapes exchanged with the content platform.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Documents are identified by the platform's integer post id.
pub type DocumentId = i64;

/// Pseudo field id under which edit buffers carry the excerpt.
pub const EXCERPT_FIELD: &str = "excerpt";

// =============================================================================
// RESERVED FILE KEYS
// =============================================================================

/// Attachment id of the uploaded file.
pub const FILE_ID_KEY: &str = "document_file_id";
/// Public URL of the uploaded file.
pub const FILE_URL_KEY: &str = "document_file_url";
/// Base name of the stored file.
pub const FILE_NAME_KEY: &str = "document_file_name";
/// MIME type of the stored file.
pub const FILE_TYPE_KEY: &str = "document_file_type";
/// File size in bytes.
pub const FILE_SIZE_KEY: &str = "document_file_size";

/// Keys the server derives from the attached file. They may appear in
/// `Document::metadata` without being configured metadata fields.
pub const RESERVED_FILE_KEYS: [&str; 5] = [
    FILE_ID_KEY,
    FILE_URL_KEY,
    FILE_NAME_KEY,
    FILE_TYPE_KEY,
    FILE_SIZE_KEY,
];

// =============================================================================
// DOCUMENT STATUS
// =============================================================================

/// Publication status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    #[serde(rename = "publish")]
    Published,
    Draft,
    Pending,
    Private,
    #[serde(rename = "trash")]
    Trashed,
}

impl DocumentStatus {
    /// Every status a document can hold outside the trash.
    pub const ACTIVE: [DocumentStatus; 4] = [
        DocumentStatus::Published,
        DocumentStatus::Draft,
        DocumentStatus::Pending,
        DocumentStatus::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "publish",
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Trashed => "trash",
        }
    }

    pub fn is_trashed(&self) -> bool {
        matches!(self, Self::Trashed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" | "published" => Ok(Self::Published),
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "private" => Ok(Self::Private),
            "trash" | "trashed" => Ok(Self::Trashed),
            other => Err(Error::InvalidInput(format!(
                "unknown document status: {}",
                other
            ))),
        }
    }
}

/// Which slice of the collection the list is showing.
///
/// The filter changes the meaning of "delete": in the trash view it removes
/// a document permanently, everywhere else it moves it to the trash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Every non-trashed status.
    #[default]
    All,
    Trash,
}

impl StatusFilter {
    pub fn is_trash_view(&self) -> bool {
        matches!(self, Self::Trash)
    }

    pub fn is_all_view(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Statuses included by this filter.
    pub fn statuses(&self) -> &'static [DocumentStatus] {
        match self {
            Self::All => &DocumentStatus::ACTIVE,
            Self::Trash => &[DocumentStatus::Trashed],
        }
    }

    pub fn matches(&self, status: DocumentStatus) -> bool {
        self.statuses().contains(&status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// METADATA VALUES
// =============================================================================

/// A stored metadata value: plain text, or the term names of a
/// multi-select taxonomy field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Terms(Vec<String>),
}

impl MetadataValue {
    /// String form used for change detection. Term lists are joined with a
    /// bare comma, so `["a", "b"]` and `"a,b"` compare equal.
    pub fn coerce(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Terms(terms) => terms.join(","),
        }
    }

    /// Text shown in a read-only table cell.
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Terms(terms) => terms.join(", "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Terms(terms) => terms.iter().all(|t| t.is_empty()),
        }
    }
}

impl Default for MetadataValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(terms: Vec<String>) -> Self {
        Self::Terms(terms)
    }
}

/// Coerce an optional value the way change detection needs it: a missing
/// value compares equal to the empty string.
pub fn coerce_value(value: Option<&MetadataValue>) -> String {
    value.map(MetadataValue::coerce).unwrap_or_default()
}

/// Field id → value map carried by documents, buffers and patches.
pub type MetadataMap = BTreeMap<String, MetadataValue>;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// A document as listed by the content platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    /// Upload date as reported by the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub metadata: MetadataMap,
}

impl Document {
    pub fn new(id: DocumentId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            excerpt: None,
            status: DocumentStatus::Published,
            date: None,
            metadata: MetadataMap::new(),
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_meta(mut self, field_id: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(field_id.into(), value.into());
        self
    }

    /// Excerpt with a missing value read as empty.
    pub fn excerpt_text(&self) -> &str {
        self.excerpt.as_deref().unwrap_or("")
    }

    pub fn meta(&self, field_id: &str) -> Option<&MetadataValue> {
        self.metadata.get(field_id)
    }

    fn meta_text(&self, key: &str) -> Option<String> {
        self.metadata
            .get(key)
            .map(MetadataValue::coerce)
            .filter(|s| !s.is_empty())
    }

    /// Attributes of the attached file, derived from the reserved keys.
    pub fn file(&self) -> FileAttributes {
        FileAttributes {
            url: self.meta_text(FILE_URL_KEY),
            filename: self.meta_text(FILE_NAME_KEY),
            mime_type: self.meta_text(FILE_TYPE_KEY),
            size_bytes: self
                .meta_text(FILE_SIZE_KEY)
                .and_then(|s| s.trim().parse::<u64>().ok()),
        }
    }
}

/// File data attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub url: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

/// One page of the document list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub total_count: u64,
    pub total_pages: u32,
    pub current_page: u32,
}

/// Document counts keyed by status name (`publish`, `trash`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCounts(pub BTreeMap<String, u64>);

impl StatusCounts {
    pub fn get(&self, status: &str) -> u64 {
        self.0.get(status).copied().unwrap_or(0)
    }

    /// Sum over every status except `trash`.
    pub fn total_active(&self) -> u64 {
        self.0
            .iter()
            .filter(|(status, _)| status.as_str() != DocumentStatus::Trashed.as_str())
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn trashed(&self) -> u64 {
        self.get(DocumentStatus::Trashed.as_str())
    }
}

/// Partial update of a document's core (non-metadata) attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl CoreUpdate {
    pub fn excerpt(excerpt: impl Into<String>) -> Self {
        Self {
            excerpt: Some(excerpt.into()),
        }
    }
}

/// A file handed to the upload flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// =============================================================================
// METADATA FIELDS
// =============================================================================

/// Kind of a configured metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Date,
    Taxonomy,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Taxonomy => "taxonomy",
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "date" => Ok(Self::Date),
            "taxonomy" => Ok(Self::Taxonomy),
            other => Err(Error::InvalidInput(format!("Invalid field type: {}", other))),
        }
    }
}

/// A term of a taxonomy field's closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTaxonomyOption")]
pub struct TaxonomyOption {
    pub name: String,
    /// Id of the backing term, once the server has created it.
    pub term_id: Option<i64>,
}

impl TaxonomyOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            term_id: None,
        }
    }

    pub fn with_term_id(mut self, term_id: i64) -> Self {
        self.term_id = Some(term_id);
        self
    }
}

/// Options arrive either as bare names (older settings) or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaxonomyOption {
    Name(String),
    Object {
        #[serde(alias = "label")]
        name: String,
        #[serde(default, alias = "id")]
        term_id: Option<i64>,
    },
}

impl From<RawTaxonomyOption> for TaxonomyOption {
    fn from(raw: RawTaxonomyOption) -> Self {
        match raw {
            RawTaxonomyOption::Name(name) => TaxonomyOption::new(name),
            RawTaxonomyOption::Object { name, term_id } => TaxonomyOption { name, term_id },
        }
    }
}

/// A configured metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<TaxonomyOption>,
}

impl MetadataField {
    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type: FieldType::Text,
            order: 0,
            options: Vec::new(),
        }
    }

    pub fn date(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Date,
            ..Self::text(id, label)
        }
    }

    pub fn taxonomy<I, S>(id: impl Into<String>, label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_type: FieldType::Taxonomy,
            options: options.into_iter().map(|o| TaxonomyOption::new(o)).collect(),
            ..Self::text(id, label)
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// The control a view renders for this field. Taxonomy fields are a
    /// closed choice whose first entry is the empty selection.
    pub fn control(&self) -> FieldControl {
        match self.field_type {
            FieldType::Text => FieldControl::Text,
            FieldType::Date => FieldControl::Date,
            FieldType::Taxonomy => {
                let mut choices = Vec::with_capacity(self.options.len() + 1);
                choices.push(Choice {
                    label: "Select…".to_string(),
                    value: String::new(),
                });
                choices.extend(self.options.iter().map(|o| Choice {
                    label: o.name.clone(),
                    value: o.name.clone(),
                }));
                FieldControl::Choice(choices)
            }
        }
    }

    /// Case-insensitive lookup of a taxonomy option by name.
    pub fn find_option(&self, name: &str) -> Option<&TaxonomyOption> {
        let wanted = name.trim().to_lowercase();
        self.options
            .iter()
            .find(|o| o.name.trim().to_lowercase() == wanted)
    }
}

/// Input control for a metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "choices", rename_all = "lowercase")]
pub enum FieldControl {
    Text,
    Date,
    Choice(Vec<Choice>),
}

/// One entry of a closed choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}
