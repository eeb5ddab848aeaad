//! Notification service: stacked, deduplicated user-facing notices.
//!
//! A notice with a non-zero duration is dismissed automatically once the
//! duration elapses; a duration of `0` keeps it until [`dismiss`] is called.
//! Auto-dismiss runs on the tokio runtime when one is available. Embedders
//! driving their own clock can call [`prune_expired`] instead.
//!
//! [`dismiss`]: NotificationService::dismiss
//! [`prune_expired`]: NotificationService::prune_expired

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use docrepo_core::defaults::NOTICE_PERSIST;
use docrepo_core::{EventBus, NoticeId, NoticeLevel, RepositoryEvent};

use crate::lock;

/// A notice currently on the stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub message: String,
    /// 0 means the notice persists until dismissed.
    pub duration_ms: u64,
    pub posted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    generation: u64,
}

impl Notice {
    pub fn is_persistent(&self) -> bool {
        self.duration_ms == NOTICE_PERSIST
    }
}

struct Inner {
    bus: Arc<EventBus>,
    default_duration_ms: u64,
    notices: Mutex<Vec<Notice>>,
    generation: AtomicU64,
}

impl Inner {
    /// Remove a notice. With `generation` set, only a notice that has not
    /// been re-posted since that generation is removed.
    fn remove(&self, id: NoticeId, generation: Option<u64>) -> bool {
        let removed = {
            let mut notices = lock(&self.notices);
            let before = notices.len();
            notices.retain(|n| n.id != id || generation.is_some_and(|g| n.generation != g));
            notices.len() != before
        };
        if removed {
            debug!(component = "notices", notice_id = %id, "Notice dismissed");
            self.bus
                .emit(RepositoryEvent::NoticeDismissed { notice_id: id });
        }
        removed
    }
}

/// Posts and tracks user-facing notices.
#[derive(Clone)]
pub struct NotificationService {
    inner: Arc<Inner>,
}

impl NotificationService {
    /// Create a service whose shorthand methods use `default_duration_ms`.
    pub fn new(bus: Arc<EventBus>, default_duration_ms: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                bus,
                default_duration_ms,
                notices: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Post a notice.
    ///
    /// If a notice with the same level and message is already visible, no
    /// second notice is stacked: the existing id is returned and its timer
    /// starts over with the new duration.
    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>, duration_ms: u64) -> NoticeId {
        let message = message.into();
        let now = Utc::now();
        let expires_at = expiry(now, duration_ms);
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let (id, is_new) = {
            let mut notices = lock(&self.inner.notices);
            match notices
                .iter_mut()
                .find(|n| n.level == level && n.message == message)
            {
                Some(existing) => {
                    existing.duration_ms = duration_ms;
                    existing.expires_at = expires_at;
                    existing.generation = generation;
                    (existing.id, false)
                }
                None => {
                    let id = Uuid::now_v7();
                    notices.push(Notice {
                        id,
                        level,
                        message: message.clone(),
                        duration_ms,
                        posted_at: now,
                        expires_at,
                        generation,
                    });
                    (id, true)
                }
            }
        };

        if is_new {
            debug!(
                component = "notices",
                notice_id = %id,
                level = level.as_str(),
                duration_ms,
                "Notice posted"
            );
            self.inner.bus.emit(RepositoryEvent::NoticePosted {
                notice_id: id,
                level,
                message,
                duration_ms,
            });
        } else {
            debug!(component = "notices", notice_id = %id, "Duplicate notice, timer restarted");
        }

        if duration_ms != NOTICE_PERSIST {
            self.schedule_dismiss(id, generation, duration_ms);
        }
        id
    }

    pub fn success(&self, message: impl Into<String>) -> NoticeId {
        self.notify(NoticeLevel::Success, message, self.inner.default_duration_ms)
    }

    pub fn warning(&self, message: impl Into<String>) -> NoticeId {
        self.notify(NoticeLevel::Warning, message, self.inner.default_duration_ms)
    }

    pub fn error(&self, message: impl Into<String>) -> NoticeId {
        self.notify(NoticeLevel::Error, message, self.inner.default_duration_ms)
    }

    /// Post a notice that stays until dismissed.
    pub fn persistent(&self, level: NoticeLevel, message: impl Into<String>) -> NoticeId {
        self.notify(level, message, NOTICE_PERSIST)
    }

    /// Remove a notice. Returns false when it was already gone.
    pub fn dismiss(&self, id: NoticeId) -> bool {
        self.inner.remove(id, None)
    }

    /// Visible notices in stacking order (oldest first).
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.inner.notices).clone()
    }

    /// Drop every notice whose expiry is at or before `now`.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<NoticeId> = lock(&self.inner.notices)
            .iter()
            .filter(|n| n.expires_at.is_some_and(|at| at <= now))
            .map(|n| n.id)
            .collect();
        expired
            .into_iter()
            .filter(|id| self.inner.remove(*id, None))
            .count()
    }

    fn schedule_dismiss(&self, id: NoticeId, generation: u64, duration_ms: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            if let Some(inner) = inner.upgrade() {
                inner.remove(id, Some(generation));
            }
        });
    }
}

/// When a notice posted at `now` expires. `None` for persistent notices and
/// for durations past what the clock can represent.
fn expiry(now: DateTime<Utc>, duration_ms: u64) -> Option<DateTime<Utc>> {
    if duration_ms == NOTICE_PERSIST {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(i64::try_from(duration_ms).ok()?)?;
    now.checked_add_signed(delta)
}
