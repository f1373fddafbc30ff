//! In-memory store engine.
//!
//! Entities live in a [`DashMap`] keyed by [`Key`], each tagged with a
//! monotonically increasing version. Transactions are optimistic:
//!
//! ```text
//! begin ──> get (record version) ──> put/delete (buffer) ──> commit
//!                                                              │
//!                     commit lock: re-check read versions, apply writes
//! ```
//!
//! Every writer, transactional or not, takes the commit lock, so a commit's
//! validation and application are atomic with respect to all other writes.
//! Readers never take it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::entity::Entity;
use crate::error::DatastoreError;
use crate::key::{Key, KeyId};
use crate::store::{Datastore, Query, Transaction};

/// First id handed out for incomplete keys.
const FIRST_ALLOCATED_ID: i64 = 1;

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    entity: Entity,
}

#[derive(Debug)]
struct Inner {
    entities: DashMap<Key, Versioned>,
    next_id: AtomicI64,
    clock: AtomicU64,
    commit_lock: Mutex<()>,
    available: AtomicBool,
}

impl Inner {
    fn check_available(&self) -> Result<(), DatastoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DatastoreError::Unavailable(
                "in-memory datastore is offline".to_owned(),
            ))
        }
    }

    fn next_version(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current version of `key`, or 0 when absent.
    fn version_of(&self, key: &Key) -> u64 {
        self.entities.get(key).map_or(0, |v| v.version)
    }

    fn write(&self, key: Key, entity: Option<Entity>) {
        match entity {
            Some(entity) => {
                let version = self.next_version();
                self.entities.insert(key, Versioned { version, entity });
            }
            None => {
                self.entities.remove(&key);
            }
        }
    }

    fn put_locked(&self, key: Key, entity: Entity) -> Key {
        let key = if matches!(key.id(), KeyId::Incomplete) {
            key.with_id(KeyId::Id(self.next_id.fetch_add(1, Ordering::Relaxed)))
        } else {
            key
        };
        let _guard = self.commit_lock.lock();
        self.write(key.clone(), Some(entity));
        key
    }

    fn delete_locked(&self, key: &Key) -> bool {
        let _guard = self.commit_lock.lock();
        self.entities.remove(key).is_some()
    }

    fn commit_locked(
        &self,
        reads: &HashMap<Key, u64>,
        writes: HashMap<Key, Option<Entity>>,
    ) -> Result<usize, DatastoreError> {
        let _guard = self.commit_lock.lock();
        for (key, seen) in reads {
            if self.version_of(key) != *seen {
                return Err(DatastoreError::Conflict(key.to_string()));
            }
        }
        let count = writes.len();
        for (key, entity) in writes {
            self.write(key, entity);
        }
        Ok(count)
    }
}

/// Validate that `key` can address an entity.
///
/// Every ancestor must be complete and share the key's namespace. The key
/// itself may be incomplete only when `allow_incomplete` is set.
fn validate_key(key: &Key, allow_incomplete: bool) -> Result<(), DatastoreError> {
    if key.kind().is_empty() {
        return Err(DatastoreError::InvalidKey("empty kind".to_owned()));
    }
    if !allow_incomplete && !key.id().is_complete() {
        return Err(DatastoreError::InvalidKey(format!("incomplete key {key}")));
    }
    for ancestor in key.ancestors() {
        if !ancestor.id().is_complete() {
            return Err(DatastoreError::InvalidKey(format!(
                "incomplete ancestor in {key}"
            )));
        }
        if ancestor.namespace() != key.namespace() {
            return Err(DatastoreError::InvalidKey(format!(
                "ancestor namespace {:?} differs from {:?} in {key}",
                ancestor.namespace(),
                key.namespace(),
            )));
        }
    }
    Ok(())
}

/// Concurrent in-process implementation of [`Datastore`].
///
/// Cloning is cheap and yields a handle to the same data.
#[derive(Debug, Clone)]
pub struct MemoryDatastore {
    inner: Arc<Inner>,
}

impl MemoryDatastore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entities: DashMap::new(),
                next_id: AtomicI64::new(FIRST_ALLOCATED_ID),
                clock: AtomicU64::new(0),
                commit_lock: Mutex::new(()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Take the store on- or offline. While offline every operation fails
    /// with [`DatastoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::Release);
    }

    /// Whether the store currently accepts operations.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::Acquire)
    }

    /// Number of stored entities across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entities.len()
    }

    /// Whether the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entities.is_empty()
    }

    /// Remove all entities.
    pub fn reset(&self) {
        let _guard = self.inner.commit_lock.lock();
        self.inner.entities.clear();
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &Key) -> Result<Option<Entity>, DatastoreError> {
        self.inner.check_available()?;
        validate_key(key, false)?;
        Ok(self.inner.entities.get(key).map(|v| v.entity.clone()))
    }

    async fn put(&self, key: Key, entity: Entity) -> Result<Key, DatastoreError> {
        self.inner.check_available()?;
        validate_key(&key, true)?;
        let key = self.inner.put_locked(key, entity);
        debug!(key = %key, "stored entity");
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> Result<(), DatastoreError> {
        self.inner.check_available()?;
        validate_key(key, false)?;
        let existed = self.inner.delete_locked(key);
        debug!(key = %key, existed, "deleted entity");
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<(Key, Entity)>, DatastoreError> {
        self.inner.check_available()?;
        let mut results: Vec<(Key, Entity)> = self
            .inner
            .entities
            .iter()
            .filter(|entry| query.matches(entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().entity.clone()))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        debug!(kind = %query.kind, namespace = %query.namespace, count = results.len(), "ran query");
        Ok(results)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DatastoreError> {
        self.inner.check_available()?;
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            reads: HashMap::new(),
            writes: HashMap::new(),
        }))
    }
}

/// Optimistic transaction over a [`MemoryDatastore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    inner: Arc<Inner>,
    /// Version observed for each key read (0 = absent).
    reads: HashMap<Key, u64>,
    /// Buffered writes; `None` is a delete.
    writes: HashMap<Key, Option<Entity>>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &Key) -> Result<Option<Entity>, DatastoreError> {
        self.inner.check_available()?;
        validate_key(key, false)?;
        if let Some(buffered) = self.writes.get(key) {
            return Ok(buffered.clone());
        }
        let current = self.inner.entities.get(key).map(|v| v.value().clone());
        self.reads
            .entry(key.clone())
            .or_insert_with(|| current.as_ref().map_or(0, |v| v.version));
        Ok(current.map(|v| v.entity))
    }

    async fn put(&mut self, key: Key, entity: Entity) -> Result<(), DatastoreError> {
        validate_key(&key, false)?;
        self.writes.insert(key, Some(entity));
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<(), DatastoreError> {
        validate_key(key, false)?;
        self.writes.insert(key.clone(), None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatastoreError> {
        self.inner.check_available()?;
        let Self {
            inner,
            reads,
            writes,
        } = *self;
        let applied = inner.commit_locked(&reads, writes)?;
        debug!(reads = reads.len(), writes = applied, "committed transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        debug!(
            reads = self.reads.len(),
            writes = self.writes.len(),
            "rolled back transaction"
        );
    }
}
