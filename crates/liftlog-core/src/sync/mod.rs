//! Synchronization between the local staging store and the remote store.
//!
//! `SyncEngine` runs the reconciliation itself, in a fixed two-phase order:
//! drain pending local writes, then refresh the entity cache. `SyncScheduler`
//! decides when the engine runs (startup, reconnect, foreground, periodic
//! timer, manual) and guards against overlapping invocations.

pub mod engine;
pub mod scheduler;

pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use scheduler::SyncScheduler;
