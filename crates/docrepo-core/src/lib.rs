//! # docrepo-core
//!
//! Core types, traits, and abstractions for the document repository.
//!
//! This crate provides the data model, the [`DocumentApi`] contract the
//! engine is written against, the shared error type and the event bus.
//! Enable the `mock` feature for an in-memory [`DocumentApi`].

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod fields;
pub mod format;
pub mod logging;
pub mod models;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types at crate root
pub use config::RepositoryConfig;
pub use error::{Error, ErrorCategory, Result};
pub use events::{EventBus, EventEnvelope, NoticeId, NoticeLevel, RepositoryEvent};
pub use format::{display_file_size, display_file_type, display_filename, format_file_size};
pub use models::*;
pub use traits::*;
