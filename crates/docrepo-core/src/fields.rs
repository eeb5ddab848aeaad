//! Validation and ordering of metadata field definitions.
//!
//! Field definitions are managed on the settings surface; the rules here are
//! the ones that surface enforces before persisting a definition list.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::models::{FieldType, MetadataField};

/// Prefix of the classification that backs a taxonomy field.
pub const TAXONOMY_PREFIX: &str = "doc_";

/// Validate one field definition.
///
/// `relaxed` is used while a field is being deleted: a taxonomy field whose
/// options are already gone must still pass so the delete can complete.
/// Blank taxonomy options are dropped before counting.
pub fn validate_field(field: &MetadataField, relaxed: bool) -> Vec<String> {
    let mut errors = Vec::new();

    if field.id.trim().is_empty() {
        errors.push("Field ID is required".to_string());
    }
    if field.label.trim().is_empty() {
        errors.push("Field label is required".to_string());
    }

    if field.field_type == FieldType::Taxonomy {
        let usable = field
            .options
            .iter()
            .filter(|o| !o.name.trim().is_empty())
            .count();
        if !relaxed && usable == 0 {
            errors.push("Taxonomy fields require at least one term".to_string());
        }
    }

    errors
}

/// Validate a full definition list, reporting problems per index.
pub fn validate_fields(fields: &[MetadataField], relaxed: bool) -> Result<()> {
    let mut by_index: BTreeMap<String, String> = BTreeMap::new();
    let mut seen = HashSet::new();

    for (index, field) in fields.iter().enumerate() {
        let mut errors = validate_field(field, relaxed);
        if !field.id.is_empty() && !seen.insert(field.id.as_str()) {
            errors.push(format!("Duplicate field ID: {}", field.id));
        }
        if !errors.is_empty() {
            by_index.insert(index.to_string(), errors.join("; "));
        }
    }

    if by_index.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation {
            message: "Field validation failed".to_string(),
            field_errors: by_index,
        })
    }
}

/// Trim taxonomy options and drop the blank ones.
pub fn normalize_field(mut field: MetadataField) -> MetadataField {
    for option in &mut field.options {
        option.name = option.name.trim().to_string();
    }
    field.options.retain(|o| !o.name.is_empty());
    field
}

/// Order definitions by their `order` attribute. Stable for equal orders.
pub fn sort_fields(fields: &mut [MetadataField]) {
    fields.sort_by_key(|f| f.order);
}

/// Name of the classification backing a taxonomy field: `doc_` followed by
/// the slugified field id.
pub fn taxonomy_name(field_id: &str) -> String {
    let mut slug = String::with_capacity(field_id.len());
    let mut last_dash = false;
    for c in field_id.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    format!("{}{}", TAXONOMY_PREFIX, slug)
}
