//! Local staging store for offline-first persistence.
//!
//! This module provides the `StagingStore`: a durable, key-indexed table set
//! holding records not yet confirmed in the remote store (pending exercises,
//! sessions, sets and deletions) plus a read-through cache of remote
//! entities. Every write is flushed to disk before the call returns, so data
//! survives process termination at any point.

pub mod store;

pub use store::{PendingStats, StagingStore, StoreError};
