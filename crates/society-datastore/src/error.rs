//! Store error types.

/// Errors returned by [`Datastore`](crate::Datastore) and
/// [`Transaction`](crate::Transaction) operations.
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    /// The entity does not exist. Raised by callers inside transactions; plain
    /// `get` reports absence as `Ok(None)`.
    #[error("no such entity: {0}")]
    NoSuchEntity(String),

    /// The key is not acceptable for the requested operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A transaction lost a race with a concurrent write.
    #[error("transaction conflict on {0}")]
    Conflict(String),

    /// The store cannot be reached or refused the operation.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    /// Unexpected internal failure.
    #[error("datastore internal error: {0}")]
    Internal(String),
}

impl DatastoreError {
    /// Whether the error means the target entity is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchEntity(_))
    }
}
