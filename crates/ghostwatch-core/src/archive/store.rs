/// MessageArchive: bounded, TTL-evicting map of archived messages.
///
/// Pure state: no I/O. Every method that drops an entry hands the dropped
/// entries back so the caller can release their media files.
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;

use crate::archive::types::{ArchivedMedia, ArchivedMessage};

pub struct MessageArchive {
    entries: LruCache<String, ArchivedMessage>,
    ttl_ms: u64,
}

impl MessageArchive {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Insert an entry. Last write wins on a duplicate id.
    ///
    /// Returns entries displaced by the insert (capacity eviction or the
    /// overwritten predecessor). A predecessor's media is stripped when the
    /// new entry still references the same file.
    pub fn insert(&mut self, entry: ArchivedMessage) -> Vec<ArchivedMessage> {
        let kept_path = entry.media_path().cloned();
        let id = entry.id.clone();

        let Some((displaced_id, mut displaced)) = self.entries.push(id.clone(), entry) else {
            return Vec::new();
        };

        if displaced_id == id && displaced.media_path() == kept_path.as_ref() {
            displaced.media = None;
        }
        vec![displaced]
    }

    /// Look up an entry without touching its recency.
    pub fn lookup(&self, id: &str) -> Option<&ArchivedMessage> {
        self.entries.peek(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Remove an entry. Removing an absent id is a no-op.
    pub fn evict(&mut self, id: &str) -> Option<ArchivedMessage> {
        self.entries.pop(id)
    }

    /// Attach materialized media to an existing entry.
    ///
    /// Gives the media back if the entry is gone so the caller can decide
    /// what to do with the file.
    pub fn attach_media(&mut self, id: &str, media: ArchivedMedia) -> Result<(), ArchivedMedia> {
        match self.entries.peek_mut(id) {
            Some(entry) => {
                entry.media = Some(media);
                Ok(())
            }
            None => Err(media),
        }
    }

    /// Remove every entry older than the TTL.
    pub fn sweep_expired(&mut self, now: u64) -> Vec<ArchivedMessage> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl_ms))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.entries.pop(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
