//! Repository event types, envelope and event bus.
//!
//! Components publish what happened (notices posted, documents saved,
//! uploads progressing) on a single broadcast channel. Views, the embedding
//! application and tests subscribe independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Document, DocumentId};

/// Identifier of a posted notice.
pub type NoticeId = Uuid;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// Event Envelope
// ============================================================================

/// Envelope wrapping every emitted [`RepositoryEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"notice.posted"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Type of entity this event relates to (e.g., `"document"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// ID of the entity this event relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Domain-specific event data.
    pub payload: RepositoryEvent,
}

impl EventEnvelope {
    pub fn new(event: RepositoryEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            entity_type: event.entity_type().map(String::from),
            entity_id: event.entity_id(),
            payload: event,
        }
    }
}

// ============================================================================
// Repository Event (domain payloads)
// ============================================================================

/// Events emitted by the engine components.
///
/// Serialized as JSON with a `type` tag field, e.g.:
/// `{"type":"NoticeDismissed","notice_id":"..."}`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RepositoryEvent {
    /// A notice was added to the stack.
    NoticePosted {
        notice_id: NoticeId,
        level: NoticeLevel,
        message: String,
        /// 0 means the notice stays until dismissed.
        duration_ms: u64,
    },
    /// A notice left the stack (manually or by timeout).
    NoticeDismissed { notice_id: NoticeId },
    /// The shadow collection changed after a save; carries the full
    /// updated collection.
    DocumentsUpdated {
        changed_ids: Vec<DocumentId>,
        documents: Vec<Document>,
    },
    /// Documents were moved to the trash.
    DocumentsTrashed { document_ids: Vec<DocumentId> },
    /// Documents were restored from the trash.
    DocumentsRestored { document_ids: Vec<DocumentId> },
    /// Documents were removed permanently.
    DocumentsDeleted { document_ids: Vec<DocumentId> },
    /// Upload state of one file changed.
    UploadProgress {
        upload_id: Uuid,
        file_name: String,
        progress: u8,
        state: String,
    },
    /// The retry queue length changed.
    RetryQueueChanged { queued: usize },
}

impl RepositoryEvent {
    /// Namespaced event type for the envelope.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            RepositoryEvent::NoticePosted { .. } => "notice.posted",
            RepositoryEvent::NoticeDismissed { .. } => "notice.dismissed",
            RepositoryEvent::DocumentsUpdated { .. } => "documents.updated",
            RepositoryEvent::DocumentsTrashed { .. } => "documents.trashed",
            RepositoryEvent::DocumentsRestored { .. } => "documents.restored",
            RepositoryEvent::DocumentsDeleted { .. } => "documents.deleted",
            RepositoryEvent::UploadProgress { .. } => "upload.progress",
            RepositoryEvent::RetryQueueChanged { .. } => "retry.queue_changed",
        }
    }

    /// Entity type this event relates to.
    pub fn entity_type(&self) -> Option<&'static str> {
        match self {
            RepositoryEvent::NoticePosted { .. } | RepositoryEvent::NoticeDismissed { .. } => {
                Some("notice")
            }
            RepositoryEvent::DocumentsUpdated { .. }
            | RepositoryEvent::DocumentsTrashed { .. }
            | RepositoryEvent::DocumentsRestored { .. }
            | RepositoryEvent::DocumentsDeleted { .. } => Some("document"),
            RepositoryEvent::UploadProgress { .. } => Some("upload"),
            RepositoryEvent::RetryQueueChanged { .. } => None,
        }
    }

    /// Primary entity id, when the event concerns exactly one entity.
    pub fn entity_id(&self) -> Option<String> {
        match self {
            RepositoryEvent::NoticePosted { notice_id, .. }
            | RepositoryEvent::NoticeDismissed { notice_id } => Some(notice_id.to_string()),
            RepositoryEvent::UploadProgress { upload_id, .. } => Some(upload_id.to_string()),
            RepositoryEvent::DocumentsUpdated { changed_ids: ids, .. }
            | RepositoryEvent::DocumentsTrashed { document_ids: ids }
            | RepositoryEvent::DocumentsRestored { document_ids: ids }
            | RepositoryEvent::DocumentsDeleted { document_ids: ids } => match ids.as_slice() {
                [only] => Some(only.to_string()),
                _ => None,
            },
            RepositoryEvent::RetryQueueChanged { .. } => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all subscribers. Without subscribers the event is
    /// dropped.
    pub fn emit(&self, event: RepositoryEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(RepositoryEvent::RetryQueueChanged { queued: 3 });

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(
            envelope.payload,
            RepositoryEvent::RetryQueueChanged { queued: 3 }
        ));
        assert_eq!(envelope.event_type, "retry.queue_changed");
        assert!(envelope.entity_type.is_none());
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(32);
        bus.emit(RepositoryEvent::DocumentsTrashed {
            document_ids: vec![1, 2],
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(RepositoryEvent::DocumentsRestored {
            document_ids: vec![9],
        });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.event_type, "documents.restored");
        assert_eq!(e2.entity_id.as_deref(), Some("9"));
    }

    #[test]
    fn test_entity_id_only_for_single_document() {
        let many = RepositoryEvent::DocumentsDeleted {
            document_ids: vec![1, 2],
        };
        assert_eq!(many.entity_type(), Some("document"));
        assert!(many.entity_id().is_none());

        let one = RepositoryEvent::DocumentsDeleted {
            document_ids: vec![5],
        };
        assert_eq!(one.entity_id().as_deref(), Some("5"));
    }

    #[test]
    fn test_event_json_serialization() {
        let event = RepositoryEvent::NoticePosted {
            notice_id: Uuid::nil(),
            level: NoticeLevel::Warning,
            message: "1 of 3 metadata updates failed.".to_string(),
            duration_ms: 0,
        };
        let envelope = EventEnvelope::new(event);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event_type"], "notice.posted");
        assert_eq!(json["payload"]["type"], "NoticePosted");
        assert_eq!(json["payload"]["level"], "warning");
        assert_eq!(json["entity_type"], "notice");
        assert!(json["occurred_at"].is_string());
    }
}
