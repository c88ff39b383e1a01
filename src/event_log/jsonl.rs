//! Optional JSONL durability mirror for the event log.
//!
//! Adapted from the append-only JSONL log pattern used by a
//! task-orchestration sibling project in this corpus (there paired with a
//! SQLite task table, same as here): one file per context, one JSON object
//! per line, append-only. This is a write-behind convenience for surviving
//! a restart; it never gates `log_version`/`log_guid` bookkeeping, which
//! lives entirely in memory for the life of a process.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{ContextId, Event};

pub struct JsonlMirror {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonlMirror {
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(JsonlMirror {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path_for(&self, context_id: ContextId) -> PathBuf {
        self.dir.join(format!("{context_id}.jsonl"))
    }

    /// Appends one event as a JSON line. Failures are logged, not
    /// propagated: the mirror is a best-effort durability aid, not the
    /// source of truth.
    pub async fn append(&self, context_id: ContextId, event: &Event) {
        let path = self.path_for(context_id);
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event for jsonl mirror");
                return;
            }
        };
        let lock = self.lock.lock().expect("jsonl mirror lock poisoned");
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        drop(lock);
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path.display(), "failed to append to jsonl mirror");
        }
    }

    /// Replays a context's mirrored events in append order, for seeding a
    /// freshly started process. Returns an empty vec if no mirror file
    /// exists yet.
    pub fn replay(&self, context_id: ContextId) -> Vec<Event> {
        let path = self.path_for(context_id);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        text.lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::types::{EventKind, NewEvent};

    #[tokio::test]
    async fn append_and_replay_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mirror = JsonlMirror::new(dir.path().to_path_buf()).expect("mirror");
        let ctx = ContextId::new();
        let event = Event {
            event_no: 0,
            id: "a".into(),
            kind: EventKind::User,
            heading: None,
            content: "hi".into(),
            kvps: vec![],
            temp: false,
            timestamp: chrono::Utc::now(),
        };
        let _ = NewEvent::new("a", EventKind::User, "hi");
        mirror.append(ctx, &event).await;
        let replayed = mirror.replay(ctx);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].content, "hi");
    }
}
