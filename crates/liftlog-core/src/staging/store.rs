use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Cached, ExerciseDraft, PendingDeletion, PendingExercise, PendingSession, PendingSet,
    RemoteExercise, RemoteProfile, RemoteRoutine, SessionDraft, SetDraft, SyncState,
};

const PENDING_EXERCISES_FILE: &str = "pending_exercises.json";
const PENDING_SESSIONS_FILE: &str = "pending_sessions.json";
const PENDING_SETS_FILE: &str = "pending_sets.json";
const PENDING_DELETIONS_FILE: &str = "pending_deletions.json";
const CACHE_PROFILE_FILE: &str = "cache_profile.json";
const CACHE_EXERCISES_FILE: &str = "cache_exercises.json";
const CACHE_ROUTINES_FILE: &str = "cache_routines.json";
const META_FILE: &str = "meta.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {table} id {id}")]
    NotFound { table: &'static str, id: u64 },

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Counts of records still awaiting upload, for a sync-status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub exercises: usize,
    pub sessions: usize,
    pub sets: usize,
    pub deletions: usize,
}

impl PendingStats {
    pub fn total(&self) -> usize {
        self.exercises + self.sessions + self.sets + self.deletions
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Meta {
    next_local_id: u64,
    last_full_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    meta: Meta,
    pending_exercises: Vec<PendingExercise>,
    pending_sessions: Vec<PendingSession>,
    pending_sets: Vec<PendingSet>,
    pending_deletions: Vec<PendingDeletion>,
    cache_profile: Option<Cached<RemoteProfile>>,
    cache_exercises: Vec<Cached<RemoteExercise>>,
    cache_routines: Vec<Cached<RemoteRoutine>>,
}

/// Durable table set backing the offline-first core.
///
/// One JSON document per table under the data directory; the mutated table
/// is rewritten before the call returns. All access goes through a single
/// mutex, which is never held across an await point - the UI and the sync
/// engine may share a store handle across tasks safely.
pub struct StagingStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl StagingStore {
    /// Open (or create) the store at `dir`, loading any existing tables.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let tables = Tables {
            meta: load_table(&dir, META_FILE)?.unwrap_or_default(),
            pending_exercises: load_table(&dir, PENDING_EXERCISES_FILE)?.unwrap_or_default(),
            pending_sessions: load_table(&dir, PENDING_SESSIONS_FILE)?.unwrap_or_default(),
            pending_sets: load_table(&dir, PENDING_SETS_FILE)?.unwrap_or_default(),
            pending_deletions: load_table(&dir, PENDING_DELETIONS_FILE)?.unwrap_or_default(),
            cache_profile: load_table(&dir, CACHE_PROFILE_FILE)?.unwrap_or_default(),
            cache_exercises: load_table(&dir, CACHE_EXERCISES_FILE)?.unwrap_or_default(),
            cache_routines: load_table(&dir, CACHE_ROUTINES_FILE)?.unwrap_or_default(),
        };

        Ok(Self {
            dir,
            tables: Mutex::new(tables),
        })
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(self.dir.join(name), contents)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock means a writer panicked mid-update; the on-disk
        // state is still one of the two table versions, so recover the data.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Pending exercises =====

    /// Stage a new exercise. Never touches the network.
    pub fn add_exercise(&self, draft: ExerciseDraft) -> Result<u64, StoreError> {
        let mut t = self.lock();
        let local_id = next_id(&mut t.meta);
        t.pending_exercises.push(PendingExercise {
            local_id,
            client_key: Uuid::new_v4(),
            name: draft.name,
            kind: draft.kind,
            description: draft.description,
            favorite: draft.favorite,
            muscle_group: draft.muscle_group,
            photo_base64: draft.photo_base64,
            state: SyncState::Pending,
            created_at: Utc::now(),
        });
        self.save(META_FILE, &t.meta)?;
        self.save(PENDING_EXERCISES_FILE, &t.pending_exercises)?;
        debug!(local_id, "staged exercise");
        Ok(local_id)
    }

    /// Pending exercises in creation order (oldest first).
    pub fn pending_exercises(&self) -> Vec<PendingExercise> {
        self.lock()
            .pending_exercises
            .iter()
            .filter(|e| e.state == SyncState::Pending)
            .cloned()
            .collect()
    }

    pub fn mark_exercise_synced(&self, local_id: u64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let ex = t
            .pending_exercises
            .iter_mut()
            .find(|e| e.local_id == local_id)
            .ok_or(StoreError::NotFound {
                table: "pending_exercises",
                id: local_id,
            })?;
        ex.state = SyncState::Synced;
        self.save(PENDING_EXERCISES_FILE, &t.pending_exercises)
    }

    /// Hard-remove a staged exercise that was never synced
    /// (cancel-before-sync). Synced records are immutable and stay for audit.
    pub fn delete_pending_exercise(&self, local_id: u64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let idx = t
            .pending_exercises
            .iter()
            .position(|e| e.local_id == local_id)
            .ok_or(StoreError::NotFound {
                table: "pending_exercises",
                id: local_id,
            })?;
        if t.pending_exercises[idx].state == SyncState::Synced {
            return Err(StoreError::Invalid(format!(
                "exercise {local_id} is already synchronized"
            )));
        }
        t.pending_exercises.remove(idx);
        self.save(PENDING_EXERCISES_FILE, &t.pending_exercises)
    }

    // ===== Pending deletions =====

    /// Stage the deletion of an exercise that exists remotely. Queueing the
    /// same target twice returns the existing tombstone instead of adding a
    /// second one.
    pub fn queue_deletion(&self, target_id: &str) -> Result<u64, StoreError> {
        let mut t = self.lock();
        if let Some(existing) = t
            .pending_deletions
            .iter()
            .find(|d| d.target_id == target_id && d.state == SyncState::Pending)
        {
            return Ok(existing.local_id);
        }
        let local_id = next_id(&mut t.meta);
        t.pending_deletions.push(PendingDeletion {
            local_id,
            target_id: target_id.to_string(),
            deleted_at: Utc::now(),
            state: SyncState::Pending,
        });
        self.save(META_FILE, &t.meta)?;
        self.save(PENDING_DELETIONS_FILE, &t.pending_deletions)?;
        Ok(local_id)
    }

    pub fn pending_deletions(&self) -> Vec<PendingDeletion> {
        self.lock()
            .pending_deletions
            .iter()
            .filter(|d| d.state == SyncState::Pending)
            .cloned()
            .collect()
    }

    pub fn mark_deletion_synced(&self, local_id: u64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let del = t
            .pending_deletions
            .iter_mut()
            .find(|d| d.local_id == local_id)
            .ok_or(StoreError::NotFound {
                table: "pending_deletions",
                id: local_id,
            })?;
        del.state = SyncState::Synced;
        self.save(PENDING_DELETIONS_FILE, &t.pending_deletions)
    }

    // ===== Pending sessions and sets =====

    /// Stage a workout session together with its sets, in one durable write.
    /// Set indexes must be 1-based and dense.
    pub fn add_session(
        &self,
        owner_id: &str,
        draft: SessionDraft,
        sets: Vec<SetDraft>,
    ) -> Result<u64, StoreError> {
        validate_set_indexes(&sets)?;

        let mut t = self.lock();
        let session_id = next_id(&mut t.meta);
        t.pending_sessions.push(PendingSession {
            local_id: session_id,
            client_key: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            routine_name: draft.routine_name,
            duration_minutes: draft.duration_minutes,
            rest_seconds_total: draft.rest_seconds_total,
            state: SyncState::Pending,
            created_at: Utc::now(),
        });
        for set in sets {
            let local_id = next_id(&mut t.meta);
            t.pending_sets.push(PendingSet {
                local_id,
                client_key: Uuid::new_v4(),
                session_local_id: session_id,
                remote_session_id: None,
                exercise_id: set.exercise_id,
                set_index: set.set_index,
                reps: set.reps,
                weight_kg: set.weight_kg,
                completed: set.completed,
                state: SyncState::Pending,
                created_at: Utc::now(),
            });
        }
        self.save(META_FILE, &t.meta)?;
        self.save(PENDING_SESSIONS_FILE, &t.pending_sessions)?;
        self.save(PENDING_SETS_FILE, &t.pending_sets)?;
        debug!(session_id, "staged session");
        Ok(session_id)
    }

    /// Stage one more set under an existing pending session. The parent must
    /// exist and the index must extend the session's dense 1-based sequence.
    pub fn add_set(&self, session_local_id: u64, set: SetDraft) -> Result<u64, StoreError> {
        let mut t = self.lock();
        if !t
            .pending_sessions
            .iter()
            .any(|s| s.local_id == session_local_id)
        {
            return Err(StoreError::NotFound {
                table: "pending_sessions",
                id: session_local_id,
            });
        }
        let expected = t
            .pending_sets
            .iter()
            .filter(|s| s.session_local_id == session_local_id)
            .count() as u32
            + 1;
        if set.set_index != expected {
            return Err(StoreError::Invalid(format!(
                "set index {} breaks dense ordering, expected {expected}",
                set.set_index
            )));
        }
        let local_id = next_id(&mut t.meta);
        t.pending_sets.push(PendingSet {
            local_id,
            client_key: Uuid::new_v4(),
            session_local_id,
            remote_session_id: None,
            exercise_id: set.exercise_id,
            set_index: set.set_index,
            reps: set.reps,
            weight_kg: set.weight_kg,
            completed: set.completed,
            state: SyncState::Pending,
            created_at: Utc::now(),
        });
        self.save(META_FILE, &t.meta)?;
        self.save(PENDING_SETS_FILE, &t.pending_sets)?;
        Ok(local_id)
    }

    pub fn pending_sessions(&self) -> Vec<PendingSession> {
        self.lock()
            .pending_sessions
            .iter()
            .filter(|s| s.state == SyncState::Pending)
            .cloned()
            .collect()
    }

    /// Pending sets belonging to the given local session.
    pub fn pending_sets_for(&self, session_local_id: u64) -> Vec<PendingSet> {
        self.lock()
            .pending_sets
            .iter()
            .filter(|s| s.session_local_id == session_local_id && s.state == SyncState::Pending)
            .cloned()
            .collect()
    }

    /// Pending sets whose remote session reference is already resolved -
    /// left behind by an earlier cycle that synced the header but lost some
    /// set inserts.
    pub fn pending_sets_with_remote_ref(&self) -> Vec<PendingSet> {
        self.lock()
            .pending_sets
            .iter()
            .filter(|s| s.state == SyncState::Pending && s.remote_session_id.is_some())
            .cloned()
            .collect()
    }

    pub fn set_set_remote_session(
        &self,
        local_id: u64,
        remote_session_id: &str,
    ) -> Result<(), StoreError> {
        let mut t = self.lock();
        let set = t
            .pending_sets
            .iter_mut()
            .find(|s| s.local_id == local_id)
            .ok_or(StoreError::NotFound {
                table: "pending_sets",
                id: local_id,
            })?;
        set.remote_session_id = Some(remote_session_id.to_string());
        self.save(PENDING_SETS_FILE, &t.pending_sets)
    }

    pub fn mark_set_synced(&self, local_id: u64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let set = t
            .pending_sets
            .iter_mut()
            .find(|s| s.local_id == local_id)
            .ok_or(StoreError::NotFound {
                table: "pending_sets",
                id: local_id,
            })?;
        set.state = SyncState::Synced;
        self.save(PENDING_SETS_FILE, &t.pending_sets)
    }

    pub fn mark_session_synced(&self, local_id: u64) -> Result<(), StoreError> {
        let mut t = self.lock();
        let session = t
            .pending_sessions
            .iter_mut()
            .find(|s| s.local_id == local_id)
            .ok_or(StoreError::NotFound {
                table: "pending_sessions",
                id: local_id,
            })?;
        session.state = SyncState::Synced;
        self.save(PENDING_SESSIONS_FILE, &t.pending_sessions)
    }

    // ===== Remote entity cache =====

    pub fn put_cached_profile(&self, profile: Cached<RemoteProfile>) -> Result<(), StoreError> {
        let mut t = self.lock();
        t.cache_profile = Some(profile);
        self.save(CACHE_PROFILE_FILE, &t.cache_profile)
    }

    pub fn cached_profile(&self, user_id: &str) -> Option<Cached<RemoteProfile>> {
        self.lock()
            .cache_profile
            .as_ref()
            .filter(|p| p.data.id == user_id)
            .cloned()
    }

    /// Upsert cached exercises by remote id (overwrite semantics).
    pub fn put_cached_exercises(
        &self,
        rows: Vec<Cached<RemoteExercise>>,
    ) -> Result<(), StoreError> {
        let mut t = self.lock();
        for row in rows {
            match t.cache_exercises.iter().position(|c| c.data.id == row.data.id) {
                Some(idx) => t.cache_exercises[idx] = row,
                None => t.cache_exercises.push(row),
            }
        }
        self.save(CACHE_EXERCISES_FILE, &t.cache_exercises)
    }

    pub fn cached_exercises(&self) -> Vec<Cached<RemoteExercise>> {
        self.lock().cache_exercises.clone()
    }

    pub fn put_cached_routines(&self, rows: Vec<Cached<RemoteRoutine>>) -> Result<(), StoreError> {
        let mut t = self.lock();
        for row in rows {
            match t.cache_routines.iter().position(|c| c.data.id == row.data.id) {
                Some(idx) => t.cache_routines[idx] = row,
                None => t.cache_routines.push(row),
            }
        }
        self.save(CACHE_ROUTINES_FILE, &t.cache_routines)
    }

    pub fn cached_routines(&self) -> Vec<Cached<RemoteRoutine>> {
        self.lock().cache_routines.clone()
    }

    // ===== Meta =====

    pub fn last_full_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().meta.last_full_sync
    }

    pub fn set_last_full_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut t = self.lock();
        t.meta.last_full_sync = Some(at);
        self.save(META_FILE, &t.meta)
    }

    pub fn pending_stats(&self) -> PendingStats {
        let t = self.lock();
        PendingStats {
            exercises: count_pending(&t.pending_exercises, |e| e.state),
            sessions: count_pending(&t.pending_sessions, |s| s.state),
            sets: count_pending(&t.pending_sets, |s| s.state),
            deletions: count_pending(&t.pending_deletions, |d| d.state),
        }
    }
}

fn next_id(meta: &mut Meta) -> u64 {
    meta.next_local_id += 1;
    meta.next_local_id
}

fn count_pending<T>(records: &[T], state: impl Fn(&T) -> SyncState) -> usize {
    records
        .iter()
        .filter(|r| state(r) == SyncState::Pending)
        .count()
}

fn validate_set_indexes(sets: &[SetDraft]) -> Result<(), StoreError> {
    for (i, set) in sets.iter().enumerate() {
        let expected = i as u32 + 1;
        if set.set_index != expected {
            return Err(StoreError::Invalid(format!(
                "set index {} at position {i} breaks dense ordering, expected {expected}",
                set.set_index
            )));
        }
    }
    Ok(())
}

fn load_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Option<T>, StoreError> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

// ============================================================================
// Tests
// ============================================================================
