//! Per-chat conversion session state.
//!
//! A session only tracks the file awaiting conversion and whether the bot is
//! waiting for a free-text format. It is deliberately ephemeral: lost on
//! restart, overwritten by the next upload.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::domain::{ChatId, FileRef};

/// The file a chat has uploaded and not yet converted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingFile {
    pub file: FileRef,
    pub file_name: String,
}

/// Session store port, injected into the handlers so the in-memory map can be
/// swapped for a bounded/external store without touching orchestration.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record a new upload. Overwrites any previous pending file and clears
    /// the awaiting-format flag.
    async fn set_pending_file(&self, chat_id: ChatId, file: PendingFile);

    async fn pending_file(&self, chat_id: ChatId) -> Option<PendingFile>;

    async fn set_awaiting_format(&self, chat_id: ChatId, awaiting: bool);

    /// Read and clear the awaiting-format flag.
    async fn take_awaiting_format(&self, chat_id: ChatId) -> bool;
}

#[derive(Clone, Debug)]
struct Entry {
    pending: Option<PendingFile>,
    awaiting_format: bool,
    last_activity: Instant,
}

/// In-memory session store with TTL-based eviction.
///
/// Expired entries are pruned on access, which keeps memory bounded without a
/// background task: the map never holds entries for chats that went idle
/// longer than the TTL plus one access.
pub struct InMemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<i64, Entry>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn prune(&self, entries: &mut HashMap<i64, Entry>, now: Instant) {
        entries.retain(|_, e| now.duration_since(e.last_activity) < self.ttl);
    }

    async fn with_entry<R>(&self, chat_id: ChatId, f: impl FnOnce(&mut Entry) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries, now);

        let entry = entries.entry(chat_id.0).or_insert_with(|| Entry {
            pending: None,
            awaiting_format: false,
            last_activity: now,
        });
        entry.last_activity = now;
        f(entry)
    }

    /// Read/update an existing entry without creating one. Chats that never
    /// uploaded anything stay out of the map entirely.
    async fn with_existing<R>(&self, chat_id: ChatId, f: impl FnOnce(&mut Entry) -> R) -> Option<R> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.prune(&mut entries, now);

        let entry = entries.get_mut(&chat_id.0)?;
        entry.last_activity = now;
        Some(f(entry))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set_pending_file(&self, chat_id: ChatId, file: PendingFile) {
        self.with_entry(chat_id, |e| {
            e.pending = Some(file);
            e.awaiting_format = false;
        })
        .await
    }

    async fn pending_file(&self, chat_id: ChatId) -> Option<PendingFile> {
        self.with_existing(chat_id, |e| e.pending.clone())
            .await
            .flatten()
    }

    async fn set_awaiting_format(&self, chat_id: ChatId, awaiting: bool) {
        self.with_entry(chat_id, |e| e.awaiting_format = awaiting).await
    }

    async fn take_awaiting_format(&self, chat_id: ChatId) -> bool {
        self.with_existing(chat_id, |e| std::mem::take(&mut e.awaiting_format))
            .await
            .unwrap_or(false)
    }
}
