//! Per-context append-only event log with long-poll reads.
//!
//! A keyed, versioned log rather than a single global broadcast channel:
//! each context owns its own sequence of events and its own
//! `log_guid`/`log_version`, and a poll blocks on a per-context
//! [`tokio::sync::Notify`] rather than racing a shared broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use super::jsonl::JsonlMirror;
use super::types::{ContextId, Event, LogSnapshot, NewEvent};

struct StoredEvent {
    event: Event,
    tombstoned: bool,
}

struct ContextLog {
    log_guid: Uuid,
    log_version: u64,
    events: Vec<StoredEvent>,
    progress: Option<String>,
    progress_active: bool,
    notify: Arc<Notify>,
}

impl ContextLog {
    fn new() -> Self {
        ContextLog {
            log_guid: Uuid::new_v4(),
            log_version: 0,
            events: Vec::new(),
            progress: None,
            progress_active: false,
            notify: Arc::new(Notify::new()),
        }
    }

    fn snapshot_from(&self, from_version: u64) -> LogSnapshot {
        let events = self
            .events
            .iter()
            .filter(|e| !e.tombstoned && e.event.event_no > from_version)
            .map(|e| e.event.clone())
            .collect();
        LogSnapshot {
            log_guid: self.log_guid,
            log_version: self.log_version,
            events,
            progress: self.progress.clone(),
            progress_active: self.progress_active,
        }
    }
}

/// Back-pressure gate shared across all contexts: append suspends once the
/// number of events appended-but-not-yet-observed-by-a-read exceeds the
/// configured high-water mark.
struct BackPressure {
    pending: AtomicUsize,
    highwater: usize,
    drained: Notify,
}

impl BackPressure {
    fn new(highwater: usize) -> Self {
        BackPressure {
            pending: AtomicUsize::new(0),
            highwater,
            drained: Notify::new(),
        }
    }

    async fn acquire(&self) {
        loop {
            if self.pending.load(Ordering::SeqCst) < self.highwater {
                self.pending.fetch_add(1, Ordering::SeqCst);
                return;
            }
            self.drained.notified().await;
        }
    }

    fn release(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.pending.fetch_sub(count.min(self.pending.load(Ordering::SeqCst)), Ordering::SeqCst);
        self.drained.notify_waiters();
    }
}

/// The Event Bus & Log Store (component C1).
pub struct LogStore {
    contexts: RwLock<HashMap<ContextId, Mutex<ContextLog>>>,
    back_pressure: BackPressure,
    mirror: Option<JsonlMirror>,
}

impl LogStore {
    pub fn new(buffer_highwater: usize, mirror: Option<JsonlMirror>) -> Self {
        LogStore {
            contexts: RwLock::new(HashMap::new()),
            back_pressure: BackPressure::new(buffer_highwater),
            mirror,
        }
    }

    async fn log_for<'a>(&'a self, context_id: ContextId) -> Arc<Notify> {
        let contexts = self.contexts.read().await;
        if let Some(log) = contexts.get(&context_id) {
            return log.lock().await.notify.clone();
        }
        drop(contexts);
        let mut contexts = self.contexts.write().await;
        let entry = contexts.entry(context_id).or_insert_with(|| Mutex::new(ContextLog::new()));
        let notify = entry.lock().await.notify.clone();
        notify
    }

    /// Appends an event, returning its assigned `event_no`. Suspends under
    /// back-pressure per §5.
    pub async fn append(&self, context_id: ContextId, new_event: NewEvent) -> u64 {
        self.back_pressure.acquire().await;
        self.log_for(context_id).await;

        let contexts = self.contexts.read().await;
        let log_mutex = contexts
            .get(&context_id)
            .expect("context log initialized by log_for");
        let mut log = log_mutex.lock().await;

        let event_no = log.events.len() as u64;
        if !new_event.temp {
            for stored in log.events.iter_mut() {
                if stored.event.id == new_event.id && !stored.tombstoned {
                    stored.tombstoned = true;
                }
            }
        } else {
            for stored in log.events.iter_mut() {
                if stored.event.id == new_event.id && stored.event.temp && !stored.tombstoned {
                    stored.tombstoned = true;
                }
            }
        }

        let event = Event {
            event_no,
            id: new_event.id,
            kind: new_event.kind,
            heading: new_event.heading,
            content: new_event.content,
            kvps: new_event.kvps,
            temp: new_event.temp,
            timestamp: chrono::Utc::now(),
        };

        if let Some(mirror) = &self.mirror {
            mirror.append(context_id, &event).await;
        }

        log.events.push(StoredEvent {
            event,
            tombstoned: false,
        });
        log.log_version += 1;
        log.notify.notify_waiters();
        drop(log);

        tracing::debug!(context_id = %context_id, event_no, "event appended");
        event_no
    }

    pub async fn set_progress(&self, context_id: ContextId, progress: Option<String>, active: bool) {
        self.log_for(context_id).await;
        let contexts = self.contexts.read().await;
        let log_mutex = contexts.get(&context_id).expect("initialized");
        let mut log = log_mutex.lock().await;
        log.progress = progress;
        log.progress_active = active;
        log.notify.notify_waiters();
    }

    /// Blocks until `log_version > from_version` or `deadline` elapses. If
    /// `caller_log_guid` is provided and differs from the context's current
    /// guid, returns the full replay immediately regardless of
    /// `from_version`.
    pub async fn read(
        &self,
        context_id: ContextId,
        caller_log_guid: Option<Uuid>,
        from_version: u64,
        deadline: Duration,
    ) -> LogSnapshot {
        let notify = self.log_for(context_id).await;

        let observed_guid = {
            let contexts = self.contexts.read().await;
            let guid = contexts.get(&context_id).expect("initialized").lock().await.log_guid;
            guid
        };
        let guid_mismatch = caller_log_guid.is_some_and(|g| g != observed_guid);
        let effective_from = if guid_mismatch { 0 } else { from_version };

        let deadline_at = tokio::time::Instant::now() + deadline;
        loop {
            let (snapshot, drained) = {
                let contexts = self.contexts.read().await;
                let log = contexts.get(&context_id).expect("initialized").lock().await;
                // A reset rotates the guid out from under an in-flight poll;
                // surface it immediately with a version-0 snapshot rather
                // than waiting out the rest of the deadline.
                let reset_mid_poll = log.log_guid != observed_guid;
                if log.log_version > effective_from || guid_mismatch || reset_mid_poll {
                    let snap = log.snapshot_from(if reset_mid_poll { 0 } else { effective_from });
                    (Some(snap), log.events.len())
                } else {
                    (None, 0)
                }
            };
            if let Some(snapshot) = snapshot {
                self.back_pressure.release(drained);
                return snapshot;
            }

            let now = tokio::time::Instant::now();
            if now >= deadline_at {
                let contexts = self.contexts.read().await;
                let log = contexts.get(&context_id).expect("initialized").lock().await;
                return log.snapshot_from(effective_from);
            }
            let remaining = deadline_at - now;
            let _ = tokio::time::timeout(remaining, notify.notified()).await;
        }
    }

    /// Returns the context's current `log_guid` without consuming any
    /// back-pressure budget or waiting on new events.
    pub async fn guid(&self, context_id: ContextId) -> Uuid {
        self.log_for(context_id).await;
        let contexts = self.contexts.read().await;
        let log = contexts.get(&context_id).expect("initialized").lock().await;
        log.log_guid
    }

    /// Rotates `log_guid`, zeroes `log_version`, empties the log.
    pub async fn reset(&self, context_id: ContextId) {
        self.log_for(context_id).await;
        let contexts = self.contexts.read().await;
        let log_mutex = contexts.get(&context_id).expect("initialized");
        let mut log = log_mutex.lock().await;
        log.log_guid = Uuid::new_v4();
        log.log_version = 0;
        log.events.clear();
        log.progress = None;
        log.progress_active = false;
        log.notify.notify_waiters();
    }

    /// Removes a context's log entirely (used by `chat_remove`).
    pub async fn remove(&self, context_id: ContextId) {
        let mut contexts = self.contexts.write().await;
        contexts.remove(&context_id);
    }

    /// Returns every non-tombstoned event, for export.
    pub async fn export_events(&self, context_id: ContextId) -> Vec<Event> {
        self.log_for(context_id).await;
        let contexts = self.contexts.read().await;
        let log = contexts.get(&context_id).expect("initialized").lock().await;
        log.snapshot_from(0).events
    }

    /// Seeds a fresh context's log from a previously exported event list
    /// (used by `chat_load`/import). The imported events retain their
    /// content but are renumbered under the new context's sequence.
    pub async fn import_events(&self, context_id: ContextId, events: Vec<Event>) {
        self.log_for(context_id).await;
        let contexts = self.contexts.read().await;
        let log_mutex = contexts.get(&context_id).expect("initialized");
        let mut log = log_mutex.lock().await;
        for (i, mut event) in events.into_iter().enumerate() {
            event.event_no = i as u64;
            log.events.push(StoredEvent {
                event,
                tombstoned: false,
            });
        }
        log.log_version = log.events.len() as u64;
        log.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::types::EventKind;

    #[tokio::test]
    async fn append_assigns_monotonic_event_no() {
        let store = LogStore::new(10_000, None);
        let ctx = ContextId::new();
        let n0 = store.append(ctx, NewEvent::new("a", EventKind::User, "hi")).await;
        let n1 = store.append(ctx, NewEvent::new("b", EventKind::Assistant, "hello")).await;
        assert_eq!(n0, 0);
        assert_eq!(n1, 1);
    }

    #[tokio::test]
    async fn temp_events_are_superseded() {
        let store = LogStore::new(10_000, None);
        let ctx = ContextId::new();
        store
            .append(ctx, NewEvent::new("turn1", EventKind::Thought, "thinking...").temp(true))
            .await;
        store
            .append(ctx, NewEvent::new("turn1", EventKind::Assistant, "done").temp(false))
            .await;
        let snap = store.read(ctx, None, 0, Duration::from_millis(10)).await;
        assert_eq!(snap.events.len(), 1);
        assert_eq!(snap.events[0].content, "done");
    }

    #[tokio::test]
    async fn read_with_stale_guid_returns_full_replay() {
        let store = LogStore::new(10_000, None);
        let ctx = ContextId::new();
        store.append(ctx, NewEvent::new("a", EventKind::User, "hi")).await;
        store.reset(ctx).await;
        store.append(ctx, NewEvent::new("b", EventKind::User, "again")).await;
        let snap = store
            .read(ctx, Some(Uuid::new_v4()), 100, Duration::from_millis(10))
            .await;
        assert_eq!(snap.log_version, 1);
        assert_eq!(snap.events.len(), 1);
    }

    #[tokio::test]
    async fn read_idempotent_at_current_version() {
        let store = LogStore::new(10_000, None);
        let ctx = ContextId::new();
        store.append(ctx, NewEvent::new("a", EventKind::User, "hi")).await;
        let snap = store.read(ctx, None, 0, Duration::from_millis(5)).await;
        let again = store
            .read(ctx, None, snap.log_version, Duration::from_millis(5))
            .await;
        assert!(again.events.is_empty());
    }

    #[tokio::test]
    async fn reset_rotates_guid_and_zeroes_version() {
        let store = LogStore::new(10_000, None);
        let ctx = ContextId::new();
        store.append(ctx, NewEvent::new("a", EventKind::User, "hi")).await;
        let before = store.read(ctx, None, 0, Duration::from_millis(5)).await;
        store.reset(ctx).await;
        let after = store.read(ctx, None, 0, Duration::from_millis(5)).await;
        assert_ne!(before.log_guid, after.log_guid);
        assert_eq!(after.log_version, 0);
        assert!(after.events.is_empty());
    }

    #[tokio::test]
    async fn reset_during_in_flight_poll_wakes_it_immediately() {
        let store = Arc::new(LogStore::new(10_000, None));
        let ctx = ContextId::new();
        let before_guid = store.guid(ctx).await;

        let poll_store = store.clone();
        let poll = tokio::spawn(async move { poll_store.read(ctx, None, 5, Duration::from_secs(5)).await });
        tokio::task::yield_now().await;
        store.reset(ctx).await;

        let snapshot = tokio::time::timeout(Duration::from_millis(200), poll)
            .await
            .expect("poll returned before the deadline")
            .expect("join");
        assert_eq!(snapshot.log_version, 0);
        assert_ne!(snapshot.log_guid, before_guid);
        assert!(snapshot.events.is_empty());
    }
}
