//! Data models for liftlog entities.
//!
//! This module contains the record types flowing through the staging store
//! and the sync engine:
//!
//! - `PendingExercise`, `PendingSession`, `PendingSet`, `PendingDeletion`:
//!   locally staged writes awaiting upload
//! - `RemoteProfile`, `RemoteExercise`, `RemoteRoutine`, `RemoteSession`:
//!   rows as issued by the remote store
//! - `Cached<T>`: a remote row paired with its local refresh timestamp
//! - `ExerciseListItem`: combined pending + cached listing entry

pub mod cached;
pub mod pending;

pub use cached::{Cached, ExerciseListItem, RemoteExercise, RemoteProfile, RemoteRoutine, RemoteSession};
pub use pending::{
    ExerciseDraft, ExerciseKind, PendingDeletion, PendingExercise, PendingSession, PendingSet,
    SessionDraft, SetDraft, SyncState,
};
