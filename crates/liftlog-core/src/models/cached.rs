use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pending::PendingExercise;

/// User profile row as stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub id: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub weight_kg: Option<f64>,
    /// Preferred display units, e.g. "metric" or "imperial".
    pub units: Option<String>,
    pub default_rest_seconds: Option<u32>,
    pub height_cm: Option<f64>,
    pub gender: Option<String>,
    #[serde(default)]
    pub streak_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteExercise {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub kind: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub muscle_group: Option<String>,
    pub equipment: Option<String>,
    pub icon: Option<String>,
    pub photo_url: Option<String>,
    /// Idempotency key echoed back from the insert, when the row originated
    /// on this device.
    pub client_key: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRoutine {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Weekday the routine is scheduled for, if any.
    pub assigned_day: Option<String>,
}

/// Insert acknowledgement for a workout session header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSession {
    pub id: String,
}

/// A remote row paired with the local timestamp of its last refresh.
/// Staleness decisions in the cache policy are computed from `refreshed_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cached<T> {
    pub data: T,
    pub refreshed_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            refreshed_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.refreshed_at
    }
}

/// One entry in a combined exercise listing: locally staged records appear
/// ahead of the cached/remote collection until they are synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ExerciseListItem {
    Pending(PendingExercise),
    Cached(RemoteExercise),
}

impl ExerciseListItem {
    pub fn name(&self) -> &str {
        match self {
            ExerciseListItem::Pending(ex) => &ex.name,
            ExerciseListItem::Cached(ex) => &ex.name,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ExerciseListItem::Pending(_))
    }
}
