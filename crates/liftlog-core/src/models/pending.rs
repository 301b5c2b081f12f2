use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload state of a locally staged record.
///
/// Records are created `Pending` and transition to `Synced` exactly once,
/// when the remote store has acknowledged them. Synced records are retained
/// for audit and never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Strength,
    Cardio,
}

impl ExerciseKind {
    /// Icon name stored alongside the exercise on the remote side.
    pub fn icon(&self) -> &'static str {
        match self {
            ExerciseKind::Strength => "fitness_center",
            ExerciseKind::Cardio => "directions_run",
        }
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExerciseKind::Strength => write!(f, "Strength"),
            ExerciseKind::Cardio => write!(f, "Cardio"),
        }
    }
}

/// Caller-supplied fields for a new exercise; the staging store mints the
/// local id, client key, state and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseDraft {
    pub name: String,
    pub kind: ExerciseKind,
    pub description: String,
    pub favorite: bool,
    pub muscle_group: String,
    /// Optional image payload, base64-encoded. Uploaded at sync time.
    pub photo_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingExercise {
    pub local_id: u64,
    /// Client-generated idempotency key; remote inserts upsert on it, so a
    /// replayed insert cannot create a duplicate row.
    pub client_key: Uuid,
    pub name: String,
    pub kind: ExerciseKind,
    pub description: String,
    pub favorite: bool,
    pub muscle_group: String,
    pub photo_base64: Option<String>,
    pub state: SyncState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDraft {
    pub routine_name: String,
    pub duration_minutes: u32,
    /// Accumulated rest time over the whole session.
    pub rest_seconds_total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSession {
    pub local_id: u64,
    pub client_key: Uuid,
    pub owner_id: String,
    pub routine_name: String,
    pub duration_minutes: u32,
    pub rest_seconds_total: u32,
    pub state: SyncState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDraft {
    pub exercise_id: String,
    /// 1-based position within the session; must be dense per session.
    pub set_index: u32,
    pub reps: u32,
    /// Canonical unit. Display conversion happens in the preferences layer.
    pub weight_kg: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSet {
    pub local_id: u64,
    pub client_key: Uuid,
    /// Local parent session; valid at insert time, enforced by the store.
    pub session_local_id: u64,
    /// Remote session id, stamped once the parent header insert succeeds.
    pub remote_session_id: Option<String>,
    pub exercise_id: String,
    pub set_index: u32,
    pub reps: u32,
    pub weight_kg: f64,
    pub completed: bool,
    pub state: SyncState,
    pub created_at: DateTime<Utc>,
}

/// Tombstone for an exercise that existed remotely before the user deleted
/// it locally. Local-only exercises are removed outright instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDeletion {
    pub local_id: u64,
    pub target_id: String,
    pub deleted_at: DateTime<Utc>,
    pub state: SyncState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_kind_icon() {
        assert_eq!(ExerciseKind::Strength.icon(), "fitness_center");
        assert_eq!(ExerciseKind::Cardio.icon(), "directions_run");
    }

    #[test]
    fn test_sync_state_serialization() {
        assert_eq!(serde_json::to_string(&SyncState::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&SyncState::Synced).unwrap(), "\"synced\"");
    }
}
