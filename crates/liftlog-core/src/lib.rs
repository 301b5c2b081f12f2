//! liftlog core - offline-first synchronization for a personal fitness log.
//!
//! The application layer (views, routing, forms) lives elsewhere; this crate
//! is the part that keeps a local staging store consistent with the hosted
//! backend under unreliable connectivity:
//!
//! - [`staging::StagingStore`]: durable local tables for pending writes and
//!   cached remote entities
//! - [`cache::CacheFirst`]: staleness-driven read resolution with offline
//!   fallback
//! - [`remote::RemoteGateway`]: contract over the hosted data service, with
//!   [`remote::RestGateway`] as the production adapter
//! - [`sync::SyncEngine`]: two-phase reconciliation (drain pending writes,
//!   then refresh the cache)
//! - [`sync::SyncScheduler`]: decides when the engine runs
//!
//! Writes never wait for the network: they land in the staging store and are
//! replayed by the engine, at least once, with client-generated idempotency
//! keys making replays safe.

pub mod cache;
pub mod config;
pub mod models;
pub mod net;
pub mod prefs;
pub mod remote;
pub mod staging;
pub mod sync;

pub use cache::{CacheFirst, CacheOptions, CollectionRead};
pub use config::Config;
pub use models::{
    Cached, ExerciseDraft, ExerciseKind, ExerciseListItem, PendingDeletion, PendingExercise,
    PendingSession, PendingSet, RemoteExercise, RemoteProfile, RemoteRoutine, SessionDraft,
    SetDraft, SyncState,
};
pub use net::Connectivity;
pub use prefs::{Preferences, PreferencesHandle, Units};
pub use remote::{GatewayError, Identity, RemoteGateway, RestGateway};
pub use staging::{PendingStats, StagingStore, StoreError};
pub use sync::{SyncEngine, SyncOutcome, SyncReport, SyncScheduler};
