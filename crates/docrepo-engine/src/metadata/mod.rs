//! Metadata editing: one document at a time, or every listed document at
//! once in spreadsheet mode.
//!
//! Both surfaces save only what changed. The engine keeps its own copy of
//! the listed documents (the shadow collection) and publishes it after
//! every save that committed anything.

mod diff;
mod engine;
pub mod state;

pub use diff::{diff_row, is_dirty, seed_values, RowDiff};
pub use engine::{MetadataEngine, SaveOutcome, SkipReason};
pub use state::{BulkPhase, EditAction, EditState, FieldErrors, SinglePhase};
