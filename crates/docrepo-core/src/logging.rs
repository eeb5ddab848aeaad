//! Structured logging field name constants.
//!
//! Both crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Unexpected internal failure |
//! | WARN  | Operation failed and was routed to the retry queue, partial batch failure |
//! | INFO  | Operation completions (save, trash, restore, upload) |
//! | DEBUG | Decision points: diffs computed, rows skipped, mode changes |
//! | TRACE | Per-field iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Component emitting the event.
/// Values: "metadata", "lifecycle", "errors", "notices", "uploads", "list"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "save_single", "save_bulk", "trash", "restore", "upload"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document id being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Metadata field id.
pub const FIELD_ID: &str = "field_id";

/// Active status filter ("all", "trash").
pub const STATUS_FILTER: &str = "status_filter";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of metadata fields in a diff.
pub const FIELD_COUNT: &str = "field_count";

/// Number of external calls issued by a batch.
pub const CALL_COUNT: &str = "call_count";

/// Number of documents touched by a batch.
pub const DOCUMENT_COUNT: &str = "document_count";

/// Number of failed calls in a batch.
pub const FAILED_COUNT: &str = "failed_count";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
