//! Error handling service and retry queue.
//!
//! Every failed operation in the engine ends up in [`ErrorHandler::report`].
//! The handler decides what the user sees (a notice, unless suppressed) and
//! whether the failure is parked in the retry queue. [`ErrorHandler::retry_all`]
//! replays the queue through handlers registered per [`OperationKind`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use docrepo_core::{DocumentId, Error, EventBus, RepositoryEvent, Result};

use crate::lock;
use crate::notifications::NotificationService;

/// Fallback text when neither a custom message nor an error message exists.
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// What kind of operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Delete,
    Restore,
    Metadata,
    BulkDelete,
    BulkRestore,
    BulkMetadata,
    Upload,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Restore => "restore",
            Self::Metadata => "metadata",
            Self::BulkDelete => "bulk-delete",
            Self::BulkRestore => "bulk-restore",
            Self::BulkMetadata => "bulk-metadata",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`ErrorHandler::report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub add_to_retry_queue: bool,
    pub custom_message: Option<String>,
    pub show_notice: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            add_to_retry_queue: true,
            custom_message: None,
            show_notice: true,
        }
    }
}

impl ReportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not park the failure in the retry queue.
    pub fn without_retry(mut self) -> Self {
        self.add_to_retry_queue = false;
        self
    }

    /// Record the failure without posting a notice.
    pub fn silent(mut self) -> Self {
        self.show_notice = false;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.custom_message = Some(message.into());
        self
    }
}

/// A queued failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub kind: OperationKind,
    pub subject_id: Option<DocumentId>,
    pub error: Error,
    /// Whether replaying the same request could plausibly succeed.
    pub retryable: bool,
    pub user_message: String,
    pub failed_at: DateTime<Utc>,
}

/// Replays one kind of failed operation.
///
/// Handlers are the regular engine operations; they report their own
/// failures through [`ErrorHandler::report`], which puts the entry back in
/// the queue. An `Err` return is only counted.
#[async_trait]
pub trait RetryHandler: Send + Sync {
    async fn retry(&self, subject_id: Option<DocumentId>) -> Result<()>;
}

/// Retry handlers keyed by operation kind.
#[derive(Clone, Default)]
pub struct RetryHandlers {
    handlers: HashMap<OperationKind, Arc<dyn RetryHandler>>,
}

impl RetryHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: OperationKind, handler: Arc<dyn RetryHandler>) -> Self {
        self.insert(kind, handler);
        self
    }

    pub fn insert(&mut self, kind: OperationKind, handler: Arc<dyn RetryHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: OperationKind) -> Option<&Arc<dyn RetryHandler>> {
        self.handlers.get(&kind)
    }
}

/// Result of a [`ErrorHandler::retry_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries kept in the queue because no handler was registered.
    pub skipped: usize,
}

/// Classifies failures, posts notices and owns the retry queue.
pub struct ErrorHandler {
    notices: NotificationService,
    bus: Arc<EventBus>,
    queue: Mutex<Vec<FailedOperation>>,
}

impl ErrorHandler {
    pub fn new(notices: NotificationService, bus: Arc<EventBus>) -> Self {
        Self {
            notices,
            bus,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Report a failure. Returns the message shown (or that would have been
    /// shown) to the user.
    ///
    /// A queued failure for a document replaces any earlier entry with the
    /// same kind and document, so the queue holds at most one per pair.
    pub fn report(
        &self,
        kind: OperationKind,
        subject_id: Option<DocumentId>,
        error: &Error,
        options: ReportOptions,
    ) -> String {
        let message = options
            .custom_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback_message(error));

        warn!(
            component = "errors",
            op = kind.as_str(),
            document_id = ?subject_id,
            error = %error,
            queued = options.add_to_retry_queue,
            "Operation failed"
        );

        if options.add_to_retry_queue {
            let queued = {
                let mut queue = lock(&self.queue);
                if subject_id.is_some() {
                    queue.retain(|op| op.kind != kind || op.subject_id != subject_id);
                }
                queue.push(FailedOperation {
                    kind,
                    subject_id,
                    error: error.clone(),
                    retryable: error.is_retryable(),
                    user_message: message.clone(),
                    failed_at: Utc::now(),
                });
                queue.len()
            };
            self.bus.emit(RepositoryEvent::RetryQueueChanged { queued });
        }

        if options.show_notice {
            self.notices.error(message.clone());
        }
        message
    }

    /// Snapshot of the retry queue, oldest first.
    pub fn failed_operations(&self) -> Vec<FailedOperation> {
        lock(&self.queue).clone()
    }

    pub fn queued(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Remove one queued entry without replaying it.
    pub fn dismiss(&self, index: usize) -> Option<FailedOperation> {
        let (removed, queued) = {
            let mut queue = lock(&self.queue);
            if index >= queue.len() {
                return None;
            }
            (queue.remove(index), queue.len())
        };
        debug!(component = "errors", op = removed.kind.as_str(), "Failed operation dismissed");
        self.bus.emit(RepositoryEvent::RetryQueueChanged { queued });
        Some(removed)
    }

    /// Empty the retry queue.
    pub fn clear(&self) {
        let had_entries = {
            let mut queue = lock(&self.queue);
            let had = !queue.is_empty();
            queue.clear();
            had
        };
        if had_entries {
            self.bus.emit(RepositoryEvent::RetryQueueChanged { queued: 0 });
        }
    }

    /// Replay every queued failure that has a registered handler.
    ///
    /// Entries are taken off the queue before their handler runs. A handler
    /// that fails again reports through [`report`](Self::report) and so
    /// re-enters the queue exactly once. Entries without a handler stay
    /// queued, ahead of anything re-reported during this pass.
    pub async fn retry_all(&self, handlers: &RetryHandlers) -> RetryReport {
        let (runnable, kept): (Vec<_>, Vec<_>) = {
            let mut queue = lock(&self.queue);
            std::mem::take(&mut *queue)
                .into_iter()
                .partition(|op| handlers.get(op.kind).is_some())
        };

        let mut report = RetryReport {
            skipped: kept.len(),
            ..RetryReport::default()
        };
        if !kept.is_empty() {
            lock(&self.queue).extend(kept);
        }
        if runnable.is_empty() {
            return report;
        }

        let queued = self.queued();
        self.bus.emit(RepositoryEvent::RetryQueueChanged { queued });

        for op in runnable {
            let Some(handler) = handlers.get(op.kind) else {
                continue;
            };
            report.attempted += 1;
            match handler.retry(op.subject_id).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    debug!(
                        component = "errors",
                        op = op.kind.as_str(),
                        document_id = ?op.subject_id,
                        error = %e,
                        "Retry failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            component = "errors",
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed_count = report.failed,
            skipped = report.skipped,
            "Retry pass complete"
        );
        report
    }
}

/// Human-readable detail of an error: the server's message when it sent
/// one, else the error's own text.
pub fn error_detail(error: &Error) -> String {
    let text = error
        .user_message()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    if text.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        text
    }
}

/// The message shown when the caller supplied none.
pub fn fallback_message(error: &Error) -> String {
    format!("An error occurred: {}", error_detail(error))
}
