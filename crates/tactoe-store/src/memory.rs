//! In-process [`MemDb`] implementation.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::Instant;
use tracing::{info, trace};

use crate::{EntryId, MemDb, StoreConfig, StoreError};

/// A [`MemDb`] held entirely in memory.
///
/// One mutex guards the whole keyspace, so each call is atomic. Blocking
/// stream reads park on a [`watch`] channel that is bumped after every
/// change to a stream, and re-check the keyspace when woken.
///
/// Expiry is lazy (an expired key is dropped the next time it is touched)
/// plus periodic via [`MemDb::purge_expired`]. Time is tokio time, so
/// tests can pause and advance it.
pub struct MemoryDb {
    keyspace: Mutex<Keyspace>,
    changes: watch::Sender<u64>,
    config: StoreConfig,
}

#[derive(Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    last_id: u64,
    closed: Option<String>,
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

enum Value {
    Str(String),
    Set(BTreeSet<String>),
    Stream(VecDeque<StreamEntry>),
}

struct StreamEntry {
    id: EntryId,
    fields: HashMap<String, String>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl StreamEntry {
    fn read(&self, key: &str, field: &str) -> Result<(EntryId, String), StoreError> {
        self.fields
            .get(field)
            .map(|value| (self.id, value.clone()))
            .ok_or_else(|| StoreError::NotFound(format!("{key} entry {} field {field}", self.id)))
    }
}

impl Keyspace {
    fn purge_if_expired(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    /// The entry at `key` unless it is absent or expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        self.purge_if_expired(key, now);
        self.entries.get_mut(key)
    }

    fn stream(
        &mut self,
        key: &str,
        now: Instant,
    ) -> Result<Option<&VecDeque<StreamEntry>>, StoreError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Stream(stream),
                ..
            }) => Ok(Some(&*stream)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn append(
        &mut self,
        key: &str,
        field: &str,
        value: &str,
        now: Instant,
        max_len: usize,
    ) -> Result<EntryId, StoreError> {
        self.purge_if_expired(key, now);
        let id = EntryId(self.last_id + 1);

        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Stream(VecDeque::new())));
        let Value::Stream(stream) = &mut entry.value else {
            return Err(StoreError::WrongType(key.to_string()));
        };

        stream.push_back(StreamEntry {
            id,
            fields: HashMap::from([(field.to_string(), value.to_string())]),
        });
        while stream.len() > max_len.max(1) {
            stream.pop_front();
        }

        self.last_id = id.0;
        Ok(id)
    }
}

impl MemoryDb {
    pub fn new(config: StoreConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            changes,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Takes the store offline. Every later call (including reads already
    /// blocked in [`MemDb::xread_after`]) fails with
    /// [`StoreError::Unavailable`].
    pub async fn close(&self, reason: impl Into<String>) {
        let reason = reason.into();
        info!(%reason, "store closed");
        self.keyspace.lock().await.closed = Some(reason);
        self.notify();
    }

    /// Number of keys currently held, expired ones included until purged.
    pub async fn key_count(&self) -> usize {
        self.keyspace.lock().await.entries.len()
    }

    async fn open(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        let keyspace = self.keyspace.lock().await;
        match &keyspace.closed {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(keyspace),
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemDb for MemoryDb {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut keyspace = self.open().await?;
        match keyspace.live(key, Instant::now()) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut keyspace = self.open().await?;
        if keyspace.live(key, now).is_some() {
            return Ok(false);
        }
        keyspace.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut keyspace = self.open().await?;
        match keyspace.live(key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut keyspace = self.open().await?;
        if keyspace.entries.remove(key).is_some() {
            drop(keyspace);
            self.notify();
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut keyspace = self.open().await?;
        keyspace.purge_if_expired(key, Instant::now());
        let entry = keyspace
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
        match &mut entry.value {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut keyspace = self.open().await?;
        let Some(entry) = keyspace.live(key, Instant::now()) else {
            return Ok(false);
        };
        let Value::Set(set) = &mut entry.value else {
            return Err(StoreError::WrongType(key.to_string()));
        };

        let removed = set.remove(member);
        if set.is_empty() {
            keyspace.entries.remove(key);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut keyspace = self.open().await?;
        match keyspace.live(key, Instant::now()) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut keyspace = self.open().await?;
        match keyspace.live(key, Instant::now()) {
            None => Ok(false),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn xadd(&self, key: &str, field: &str, value: &str) -> Result<EntryId, StoreError> {
        let mut keyspace = self.open().await?;
        let id = keyspace.append(key, field, value, Instant::now(), self.config.max_stream_len)?;
        drop(keyspace);

        trace!(key, %id, "stream entry appended");
        self.notify();
        Ok(id)
    }

    async fn xadd_after(
        &self,
        key: &str,
        expected_last: EntryId,
        field: &str,
        value: &str,
    ) -> Result<EntryId, StoreError> {
        let now = Instant::now();
        let mut keyspace = self.open().await?;

        let actual = keyspace
            .stream(key, now)?
            .and_then(|stream| stream.back())
            .map(|entry| entry.id);
        if actual != Some(expected_last) {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected: expected_last,
                actual,
            });
        }

        let id = keyspace.append(key, field, value, now, self.config.max_stream_len)?;
        drop(keyspace);

        trace!(key, %id, "stream entry appended");
        self.notify();
        Ok(id)
    }

    async fn xlast(&self, key: &str, field: &str) -> Result<(EntryId, String), StoreError> {
        let mut keyspace = self.open().await?;
        keyspace
            .stream(key, Instant::now())?
            .and_then(|stream| stream.back())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?
            .read(key, field)
    }

    async fn xread_after(
        &self,
        key: &str,
        field: &str,
        after: EntryId,
        block: Duration,
    ) -> Result<(EntryId, String), StoreError> {
        let deadline = Instant::now() + block;
        // Subscribe before the first check so an append racing with it
        // still wakes us.
        let mut changes = self.changes.subscribe();

        loop {
            {
                let mut keyspace = self.open().await?;
                let stream = keyspace
                    .stream(key, Instant::now())?
                    .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
                if let Some(next) = stream.iter().find(|entry| entry.id > after) {
                    return next.read(key, field);
                }
            }

            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(StoreError::Unavailable("store dropped".into())),
                Err(_) => return Err(StoreError::NotFound(key.to_string())),
            }
        }
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut keyspace = self.open().await?;
        let before = keyspace.entries.len();
        keyspace.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - keyspace.entries.len();
        drop(keyspace);

        if purged > 0 {
            self.notify();
        }
        Ok(purged)
    }
}
