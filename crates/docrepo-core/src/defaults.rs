//! Centralized default constants for the document repository.
//!
//! **This module is the single source of truth** for shared default values.
//! Both crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// API
// =============================================================================

/// REST namespace used when none is configured.
pub const API_NAMESPACE: &str = "wp/v2";

// =============================================================================
// PAGINATION
// =============================================================================

/// Documents per list page.
pub const PAGE_SIZE: u32 = 20;

/// First page number (pages are 1-based).
pub const FIRST_PAGE: u32 = 1;

// =============================================================================
// NOTICES
// =============================================================================

/// Auto-dismiss delay for transient notices, in milliseconds.
pub const NOTICE_DURATION_MS: u64 = 5_000;

/// Duration value meaning "keep until dismissed".
pub const NOTICE_PERSIST: u64 = 0;

/// Longest configurable auto-dismiss delay (one day).
pub const NOTICE_DURATION_MAX_MS: u64 = 86_400_000;

// =============================================================================
// UPLOADS
// =============================================================================

/// Largest accepted upload (50 MiB).
pub const UPLOAD_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// MIME types accepted by the upload flow.
pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf"];

// =============================================================================
// EVENTS
// =============================================================================

/// Event bus buffer capacity. Tests use 32.
pub const EVENT_CAPACITY: usize = 256;
