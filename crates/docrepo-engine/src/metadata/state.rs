//! Edit state and the actions that change it.
//!
//! All mutation of [`EditState`] goes through [`EditState::apply`], so the
//! full set of transitions is visible in one `match`.

use std::collections::BTreeMap;

use serde::Serialize;

use docrepo_core::{Document, DocumentId, MetadataMap, MetadataValue};

/// Per-field messages keyed by field id.
pub type FieldErrors = BTreeMap<String, String>;

/// Phase of the single-document edit surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SinglePhase {
    Idle,
    Editing,
    Saving,
    /// Editing after a failed save that returned field errors.
    EditingWithErrors,
}

/// Phase of the spreadsheet surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BulkPhase {
    Idle,
    Clean,
    Dirty,
    Saving,
}

/// Snapshot of both edit surfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditState {
    /// The document open in the single edit dialog.
    pub editing_document: Option<Document>,
    /// Pending values for the open document, excerpt included.
    pub edited_values: MetadataMap,
    pub field_errors: FieldErrors,
    pub is_saving_single: bool,

    pub is_spreadsheet_mode: bool,
    /// Full field snapshot per document while in spreadsheet mode.
    pub bulk_edited_metadata: BTreeMap<DocumentId, MetadataMap>,
    /// Field errors from the last bulk save, per document.
    pub bulk_field_errors: BTreeMap<DocumentId, FieldErrors>,
    pub has_metadata_changes: bool,
    pub is_saving_bulk: bool,
}

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    BeginEdit {
        document: Document,
        values: MetadataMap,
    },
    CancelEdit,
    UpdateField {
        field_id: String,
        value: MetadataValue,
    },
    SetFieldErrors(FieldErrors),
    SetSavingSingle(bool),
    /// The edited document after a (partly) successful save.
    SetEditingDocument(Document),

    EnterSpreadsheet {
        buffer: BTreeMap<DocumentId, MetadataMap>,
    },
    ExitSpreadsheet,
    UpdateBulkField {
        document_id: DocumentId,
        field_id: String,
        value: MetadataValue,
        /// Snapshot used when the row has no buffer entry yet.
        seed: MetadataMap,
    },
    /// Replace buffer rows after a save with the server's values.
    ReseedRows(BTreeMap<DocumentId, MetadataMap>),
    SetBulkFieldErrors(BTreeMap<DocumentId, FieldErrors>),
    SetHasChanges(bool),
    SetSavingBulk(bool),
}

impl EditState {
    pub fn apply(&mut self, action: EditAction) {
        match action {
            EditAction::BeginEdit { document, values } => {
                self.editing_document = Some(document);
                self.edited_values = values;
                self.field_errors.clear();
            }
            EditAction::CancelEdit => {
                self.editing_document = None;
                self.edited_values.clear();
                self.field_errors.clear();
            }
            EditAction::UpdateField { field_id, value } => {
                self.field_errors.remove(&field_id);
                self.edited_values.insert(field_id, value);
            }
            EditAction::SetFieldErrors(errors) => self.field_errors = errors,
            EditAction::SetSavingSingle(saving) => self.is_saving_single = saving,
            EditAction::SetEditingDocument(document) => {
                if self
                    .editing_document
                    .as_ref()
                    .is_some_and(|d| d.id == document.id)
                {
                    self.editing_document = Some(document);
                }
            }
            EditAction::EnterSpreadsheet { buffer } => {
                self.is_spreadsheet_mode = true;
                self.bulk_edited_metadata = buffer;
                self.bulk_field_errors.clear();
                self.has_metadata_changes = false;
            }
            EditAction::ExitSpreadsheet => {
                self.is_spreadsheet_mode = false;
                self.bulk_edited_metadata.clear();
                self.bulk_field_errors.clear();
                self.has_metadata_changes = false;
            }
            EditAction::UpdateBulkField {
                document_id,
                field_id,
                value,
                seed,
            } => {
                if let Some(errors) = self.bulk_field_errors.get_mut(&document_id) {
                    errors.remove(&field_id);
                }
                self.bulk_edited_metadata
                    .entry(document_id)
                    .or_insert(seed)
                    .insert(field_id, value);
            }
            EditAction::ReseedRows(rows) => {
                for (id, values) in rows {
                    if let Some(entry) = self.bulk_edited_metadata.get_mut(&id) {
                        *entry = values;
                    }
                    self.bulk_field_errors.remove(&id);
                }
            }
            EditAction::SetBulkFieldErrors(errors) => self.bulk_field_errors = errors,
            EditAction::SetHasChanges(dirty) => self.has_metadata_changes = dirty,
            EditAction::SetSavingBulk(saving) => self.is_saving_bulk = saving,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing_document.is_some()
    }

    pub fn single_phase(&self) -> SinglePhase {
        match (&self.editing_document, self.is_saving_single) {
            (None, _) => SinglePhase::Idle,
            (Some(_), true) => SinglePhase::Saving,
            (Some(_), false) if !self.field_errors.is_empty() => SinglePhase::EditingWithErrors,
            (Some(_), false) => SinglePhase::Editing,
        }
    }

    pub fn bulk_phase(&self) -> BulkPhase {
        if !self.is_spreadsheet_mode {
            BulkPhase::Idle
        } else if self.is_saving_bulk {
            BulkPhase::Saving
        } else if self.has_metadata_changes {
            BulkPhase::Dirty
        } else {
            BulkPhase::Clean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> MetadataMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), MetadataValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_single_phases() {
        let mut state = EditState::default();
        assert_eq!(state.single_phase(), SinglePhase::Idle);

        state.apply(EditAction::BeginEdit {
            document: Document::new(1, "One"),
            values: values(&[("category", "Policy")]),
        });
        assert_eq!(state.single_phase(), SinglePhase::Editing);

        state.apply(EditAction::SetSavingSingle(true));
        assert_eq!(state.single_phase(), SinglePhase::Saving);

        state.apply(EditAction::SetSavingSingle(false));
        state.apply(EditAction::SetFieldErrors(
            [("category".to_string(), "Invalid".to_string())].into(),
        ));
        assert_eq!(state.single_phase(), SinglePhase::EditingWithErrors);

        // Editing the offending field clears its error
        state.apply(EditAction::UpdateField {
            field_id: "category".into(),
            value: "Guideline".into(),
        });
        assert_eq!(state.single_phase(), SinglePhase::Editing);

        state.apply(EditAction::CancelEdit);
        assert_eq!(state.single_phase(), SinglePhase::Idle);
        assert!(state.edited_values.is_empty());
    }

    #[test]
    fn test_bulk_phases_and_seeding() {
        let mut state = EditState::default();
        assert_eq!(state.bulk_phase(), BulkPhase::Idle);

        state.apply(EditAction::EnterSpreadsheet {
            buffer: [(1, values(&[("category", "Policy")]))].into(),
        });
        assert_eq!(state.bulk_phase(), BulkPhase::Clean);

        state.apply(EditAction::UpdateBulkField {
            document_id: 2,
            field_id: "category".into(),
            value: "Form".into(),
            seed: values(&[("category", ""), ("excerpt", "x")]),
        });
        assert_eq!(state.bulk_edited_metadata[&2]["excerpt"], MetadataValue::from("x"));
        assert_eq!(state.bulk_edited_metadata[&2]["category"], MetadataValue::from("Form"));

        state.apply(EditAction::SetHasChanges(true));
        assert_eq!(state.bulk_phase(), BulkPhase::Dirty);
        state.apply(EditAction::SetSavingBulk(true));
        assert_eq!(state.bulk_phase(), BulkPhase::Saving);

        state.apply(EditAction::ExitSpreadsheet);
        assert_eq!(state.bulk_phase(), BulkPhase::Idle);
        assert!(state.bulk_edited_metadata.is_empty());
    }

    #[test]
    fn test_set_editing_document_ignores_other_ids() {
        let mut state = EditState::default();
        state.apply(EditAction::BeginEdit {
            document: Document::new(1, "One"),
            values: MetadataMap::new(),
        });
        state.apply(EditAction::SetEditingDocument(Document::new(2, "Two")));
        assert_eq!(state.editing_document.as_ref().unwrap().title, "One");
    }
}
