//! Remote data service contract.
//!
//! The hosted backend is consumed through the `RemoteGateway` trait:
//! identity resolution, table-scoped reads and writes, and binary upload.
//! The core owns the contract, not the service - `RestGateway` is the
//! production adapter, and tests substitute a scripted mock.
//!
//! Insert operations carry a client-generated idempotency key and are
//! upserts on that key, so replaying an insert whose acknowledgement was
//! lost cannot duplicate the row.

pub mod error;
pub mod rest;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{RemoteExercise, RemoteProfile, RemoteRoutine, RemoteSession};

pub use error::GatewayError;
pub use rest::RestGateway;

/// Authenticated actor as resolved by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

/// Insert payload for an exercise row.
#[derive(Debug, Clone, Serialize)]
pub struct NewExercise {
    pub client_key: Uuid,
    pub owner_id: String,
    pub name: String,
    pub kind: String,
    pub description: String,
    pub favorite: bool,
    pub muscle_group: String,
    pub icon: String,
    pub photo_url: Option<String>,
}

/// Insert payload for a workout session header.
#[derive(Debug, Clone, Serialize)]
pub struct NewSession {
    pub client_key: Uuid,
    pub owner_id: String,
    pub routine_name: String,
    pub duration_minutes: u32,
    pub rest_seconds_total: u32,
    pub performed_at: DateTime<Utc>,
}

/// Insert payload for one set within a synced session.
#[derive(Debug, Clone, Serialize)]
pub struct NewSet {
    pub client_key: Uuid,
    pub session_id: String,
    pub exercise_id: String,
    pub set_index: u32,
    pub reps: u32,
    pub weight_kg: f64,
    pub completed: bool,
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Resolve the current authenticated identity. `None` means no actor is
    /// signed in (an expected state, not an error); transport failures are
    /// errors.
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, GatewayError>;

    async fn fetch_exercises(&self, owner_id: &str) -> Result<Vec<RemoteExercise>, GatewayError>;

    async fn fetch_routines(&self, owner_id: &str) -> Result<Vec<RemoteRoutine>, GatewayError>;

    async fn insert_exercise(&self, exercise: &NewExercise)
        -> Result<RemoteExercise, GatewayError>;

    /// Delete by remote id. Deleting an id that no longer exists succeeds,
    /// which keeps queued deletions idempotent.
    async fn delete_exercise(&self, id: &str) -> Result<(), GatewayError>;

    async fn insert_session(&self, session: &NewSession) -> Result<RemoteSession, GatewayError>;

    async fn insert_set(&self, set: &NewSet) -> Result<(), GatewayError>;

    /// Upload a binary object and return its public URL.
    async fn upload_image(&self, key: &str, bytes: &[u8]) -> Result<String, GatewayError>;
}
