//! End-to-end offline-first flow: create while offline, reconnect, sync,
//! read back through the cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use liftlog_core::remote::{NewExercise, NewSession, NewSet};
use liftlog_core::{
    CacheFirst, CacheOptions, Connectivity, ExerciseDraft, ExerciseKind, GatewayError, Identity,
    RemoteExercise, RemoteGateway, RemoteProfile, RemoteRoutine, StagingStore, SyncEngine,
    SyncOutcome, SyncScheduler,
};
use liftlog_core::models::RemoteSession;
use tempfile::TempDir;

const OWNER: &str = "user-1";

/// Minimal in-memory rendition of the hosted backend.
#[derive(Default)]
struct InMemoryBackend {
    exercises: Mutex<Vec<RemoteExercise>>,
    next_id: AtomicUsize,
}

impl InMemoryBackend {
    fn next_id(&self) -> String {
        format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl RemoteGateway for InMemoryBackend {
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError> {
        Ok(Some(Identity {
            id: OWNER.to_string(),
            email: Some("user-1@example.com".to_string()),
        }))
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<Option<RemoteProfile>, GatewayError> {
        Ok(None)
    }

    async fn fetch_exercises(&self, owner_id: &str) -> Result<Vec<RemoteExercise>, GatewayError> {
        Ok(self
            .exercises
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn fetch_routines(&self, _owner_id: &str) -> Result<Vec<RemoteRoutine>, GatewayError> {
        Ok(Vec::new())
    }

    async fn insert_exercise(
        &self,
        exercise: &NewExercise,
    ) -> Result<RemoteExercise, GatewayError> {
        let mut table = self.exercises.lock().unwrap();
        if let Some(existing) = table
            .iter()
            .find(|e| e.client_key == Some(exercise.client_key))
        {
            return Ok(existing.clone());
        }
        let row = RemoteExercise {
            id: self.next_id(),
            owner_id: exercise.owner_id.clone(),
            name: exercise.name.clone(),
            kind: Some(exercise.kind.clone()),
            description: Some(exercise.description.clone()),
            favorite: exercise.favorite,
            muscle_group: Some(exercise.muscle_group.clone()),
            equipment: None,
            icon: Some(exercise.icon.clone()),
            photo_url: exercise.photo_url.clone(),
            client_key: Some(exercise.client_key),
        };
        table.push(row.clone());
        Ok(row)
    }

    async fn delete_exercise(&self, id: &str) -> Result<(), GatewayError> {
        self.exercises.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn insert_session(&self, _session: &NewSession) -> Result<RemoteSession, GatewayError> {
        Ok(RemoteSession {
            id: self.next_id(),
        })
    }

    async fn insert_set(&self, _set: &NewSet) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn upload_image(&self, key: &str, _bytes: &[u8]) -> Result<String, GatewayError> {
        Ok(format!("https://cdn.example.com/{key}"))
    }
}

#[tokio::test]
async fn offline_create_syncs_once_on_reconnect() {
    let dir = TempDir::new().unwrap();
    let staging = Arc::new(StagingStore::open(dir.path()).unwrap());
    let backend = Arc::new(InMemoryBackend::default());
    let connectivity = Connectivity::new(false);

    let engine = SyncEngine::new(staging.clone(), backend.clone(), connectivity.clone());
    let scheduler = SyncScheduler::new(engine, staging.clone(), connectivity.clone());
    let reader = CacheFirst::new(staging.clone(), backend.clone(), connectivity.clone());

    // Offline: the exercise lands locally and shows up in listings
    staging
        .add_exercise(ExerciseDraft {
            name: "Bench Press".to_string(),
            kind: ExerciseKind::Strength,
            description: "Flat barbell press".to_string(),
            favorite: false,
            muscle_group: "chest".to_string(),
            photo_base64: None,
        })
        .unwrap();

    let read = reader.exercises(OWNER, CacheOptions::default()).await;
    assert!(read.served_from_cache);
    assert_eq!(read.data.len(), 1);
    assert!(read.data[0].is_pending());
    assert!(backend.exercises.lock().unwrap().is_empty());

    // A sync attempt while offline changes nothing
    let outcome = scheduler.manual_sync().await.unwrap();
    assert_eq!(outcome, Some(SyncOutcome::Offline));
    assert_eq!(staging.pending_stats().exercises, 1);

    // Reconnect fires the sync
    connectivity.set_online(true);
    let outcome = scheduler.on_reconnect().await.unwrap();
    let Some(SyncOutcome::Completed(report)) = outcome else {
        panic!("expected a completed sync, got {outcome:?}");
    };
    assert_eq!(report.exercises_synced, 1);
    assert_eq!(report.remaining_pending, 0);

    // The remote row carries the staged payload
    {
        let remote = backend.exercises.lock().unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].name, "Bench Press");
        assert_eq!(remote[0].owner_id, OWNER);
        assert_eq!(remote[0].muscle_group.as_deref(), Some("chest"));
        assert_eq!(remote[0].icon.as_deref(), Some("fitness_center"));
    }

    // A fresh listing contains the exercise exactly once: it no longer
    // appears as a pending local, only as the cached remote row
    let read = reader.exercises(OWNER, CacheOptions::default()).await;
    let bench: Vec<_> = read
        .data
        .iter()
        .filter(|e| e.name() == "Bench Press")
        .collect();
    assert_eq!(bench.len(), 1);
    assert!(!bench[0].is_pending());

    // Replaying the sync is a no-op
    let outcome = scheduler.manual_sync().await.unwrap();
    let Some(SyncOutcome::Completed(report)) = outcome else {
        panic!("expected a completed sync, got {outcome:?}");
    };
    assert_eq!(report.exercises_synced, 0);
    assert_eq!(backend.exercises.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_round_trip_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let staging = Arc::new(StagingStore::open(dir.path()).unwrap());
    let backend = Arc::new(InMemoryBackend::default());
    let connectivity = Connectivity::new(true);

    let engine = SyncEngine::new(staging.clone(), backend.clone(), connectivity.clone());

    // Seed a remote exercise, then stage its deletion twice
    backend
        .insert_exercise(&NewExercise {
            client_key: uuid::Uuid::new_v4(),
            owner_id: OWNER.to_string(),
            name: "Leg Press".to_string(),
            kind: "Strength".to_string(),
            description: String::new(),
            favorite: false,
            muscle_group: "legs".to_string(),
            icon: "fitness_center".to_string(),
            photo_url: None,
        })
        .await
        .unwrap();
    let remote_id = backend.exercises.lock().unwrap()[0].id.clone();

    staging.queue_deletion(&remote_id).unwrap();
    staging.queue_deletion(&remote_id).unwrap();

    let outcome = engine.sync_all().await.unwrap();
    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected a completed sync");
    };
    assert_eq!(report.deletions_synced, 1);
    assert!(backend.exercises.lock().unwrap().is_empty());
    assert_eq!(staging.pending_stats().deletions, 0);
}
