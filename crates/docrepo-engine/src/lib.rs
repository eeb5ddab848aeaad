//! # docrepo-engine
//!
//! Client-side coordination for the document repository: metadata editing
//! (single document and spreadsheet mode), trash/restore/delete workflows,
//! uploads, user notices and the retry queue.
//!
//! Components are constructed with their collaborators injected and are
//! meant to be shared behind an `Arc`. Operations take `&self`, so busy
//! flags and edit state can be observed while a save is still in flight.
//!
//! Save and lifecycle operations never return `Err`: failures are routed
//! through the [`ErrorHandler`] and reported back as outcome values.

pub mod error_handling;
pub mod lifecycle;
pub mod list;
pub mod metadata;
pub mod notifications;
pub mod uploads;

mod guard;

pub use error_handling::{
    ErrorHandler, FailedOperation, OperationKind, ReportOptions, RetryHandler, RetryHandlers,
    RetryReport,
};
pub use lifecycle::{
    ConfirmationPrompt, LifecycleController, LifecycleOutcome, LifecycleState, SelectionSink,
};
pub use list::{DocumentListOrchestrator, DocumentRow, RowAction, RowCell, Selection, Toolbar};
pub use metadata::{EditState, MetadataEngine, SaveOutcome, SkipReason};
pub use notifications::{Notice, NotificationService};
pub use uploads::{UploadCoordinator, UploadEntry, UploadState};

use std::sync::{Mutex, MutexGuard};

/// Lock a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
