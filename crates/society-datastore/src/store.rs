//! The store boundary: async get/put/delete/query and transactions.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::entity::Entity;
use crate::error::DatastoreError;
use crate::key::Key;

/// A kind query scoped to one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Entity kind to match.
    pub kind: String,
    /// Namespace to search.
    pub namespace: String,
    /// Only return entities under this ancestor.
    pub ancestor: Option<Key>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Create a query for all entities of `kind` in the default namespace.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: String::new(),
            ancestor: None,
            limit: None,
        }
    }

    /// Scope the query to a namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Restrict results to descendants of `ancestor`.
    #[must_use]
    pub fn ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `key` satisfies this query's kind, namespace, and ancestor.
    #[must_use]
    pub fn matches(&self, key: &Key) -> bool {
        key.kind() == self.kind
            && key.namespace() == self.namespace
            && self.ancestor.as_ref().is_none_or(|a| key.has_ancestor(a))
    }
}

/// A hierarchical, namespaced key-value store.
///
/// Every operation is scoped by the namespace carried in its key or query.
#[async_trait]
pub trait Datastore: Send + Sync + std::fmt::Debug {
    /// Fetch an entity. Absence is `Ok(None)`.
    async fn get(&self, key: &Key) -> Result<Option<Entity>, DatastoreError>;

    /// Store an entity, returning its complete key. Incomplete keys get a
    /// store-allocated id.
    async fn put(&self, key: Key, entity: Entity) -> Result<Key, DatastoreError>;

    /// Delete an entity. Deleting an absent key succeeds.
    async fn delete(&self, key: &Key) -> Result<(), DatastoreError>;

    /// Run a kind query.
    async fn query(&self, query: &Query) -> Result<Vec<(Key, Entity)>, DatastoreError>;

    /// Start a transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, DatastoreError>;
}

/// An atomic read-modify-write unit.
///
/// Reads observe committed data plus the transaction's own buffered writes.
/// Writes become visible only on [`commit`](Transaction::commit), which fails
/// with [`DatastoreError::Conflict`] if anything read has changed since.
#[async_trait]
pub trait Transaction: Send + std::fmt::Debug {
    /// Read an entity within the transaction.
    async fn get(&mut self, key: &Key) -> Result<Option<Entity>, DatastoreError>;

    /// Buffer a write. The key must be complete.
    async fn put(&mut self, key: Key, entity: Entity) -> Result<(), DatastoreError>;

    /// Buffer a delete.
    async fn delete(&mut self, key: &Key) -> Result<(), DatastoreError>;

    /// Apply buffered writes atomically.
    async fn commit(self: Box<Self>) -> Result<(), DatastoreError>;

    /// Discard buffered writes.
    async fn rollback(self: Box<Self>);
}

/// Run `f` inside a transaction, committing if it succeeds and rolling back
/// if it fails.
///
/// Failures are returned as-is; nothing is retried.
///
/// ```no_run
/// # use society_datastore::{Datastore, DatastoreError, Key, run_in_transaction};
/// # async fn example(store: &dyn Datastore, key: Key) -> Result<(), DatastoreError> {
/// run_in_transaction(store, move |tx| {
///     Box::pin(async move {
///         let entity = tx
///             .get(&key)
///             .await?
///             .ok_or_else(|| DatastoreError::NoSuchEntity(key.to_string()))?;
///         tx.put(key, entity.with("status", "active")).await
///     })
/// })
/// .await
/// # }
/// ```
pub async fn run_in_transaction<T, F>(store: &dyn Datastore, f: F) -> Result<T, DatastoreError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, Result<T, DatastoreError>> + Send,
{
    let mut tx = store.begin().await?;
    match f(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            debug!(error = %err, "transaction body failed, rolling back");
            tx.rollback().await;
            Err(err)
        }
    }
}
