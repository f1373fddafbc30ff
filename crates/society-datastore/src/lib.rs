//! Hierarchical, namespaced key-value store client for Society.
//!
//! The crate defines the store boundary consumed by resource services:
//!
//! - **Keys**: [`Key`] values form a parent/child tree scoped to a namespace
//!   and travel over the wire as opaque, URL-safe strings.
//! - **Entities**: property maps with native [`Value`] types (timestamps are
//!   stored as timestamps, not text).
//! - **Store**: the async [`Datastore`] and [`Transaction`] traits plus the
//!   [`run_in_transaction`] helper.
//! - **Memory engine**: [`MemoryDatastore`], a concurrent in-process
//!   implementation with optimistic transactions.

pub mod entity;
pub mod error;
pub mod key;
pub mod memory;
pub mod store;

pub use entity::{Entity, Value};
pub use error::DatastoreError;
pub use key::{Key, KeyError, KeyId};
pub use memory::MemoryDatastore;
pub use store::{Datastore, Query, Transaction, run_in_transaction};
