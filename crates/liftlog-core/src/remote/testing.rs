//! Scripted in-memory gateway for unit tests: canned rows, call counters,
//! and per-operation failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{RemoteExercise, RemoteProfile, RemoteRoutine, RemoteSession};

use super::{GatewayError, Identity, NewExercise, NewSession, NewSet, RemoteGateway};

#[derive(Default)]
pub(crate) struct MockGateway {
    pub identity: Mutex<Option<Identity>>,
    pub profile: Mutex<Option<RemoteProfile>>,
    pub exercises: Mutex<Vec<RemoteExercise>>,
    pub routines: Mutex<Vec<RemoteRoutine>>,
    pub sessions: Mutex<Vec<(NewSession, String)>>,
    pub sets: Mutex<Vec<NewSet>>,
    pub deleted: Mutex<Vec<String>>,

    pub fail_fetch_exercises: AtomicBool,
    pub fail_insert_exercise: AtomicBool,
    pub fail_insert_session: AtomicBool,
    pub fail_insert_set: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_upload: AtomicBool,

    pub fetch_exercise_calls: AtomicUsize,
    pub insert_exercise_calls: AtomicUsize,
    pub insert_session_calls: AtomicUsize,
    pub insert_set_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,

    next_id: AtomicUsize,
}

impl MockGateway {
    pub fn signed_in(user_id: &str) -> Self {
        let mock = Self::default();
        *mock.identity.lock().unwrap() = Some(Identity {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
        });
        mock
    }

    fn next_remote_id(&self) -> String {
        format!("r-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn injected() -> GatewayError {
        GatewayError::ServerError("injected failure".to_string())
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError> {
        Ok(self.identity.lock().unwrap().clone())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, GatewayError> {
        Ok(self
            .profile
            .lock()
            .unwrap()
            .clone()
            .filter(|p| p.id == user_id))
    }

    async fn fetch_exercises(&self, owner_id: &str) -> Result<Vec<RemoteExercise>, GatewayError> {
        self.fetch_exercise_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch_exercises.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        Ok(self
            .exercises
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn fetch_routines(&self, owner_id: &str) -> Result<Vec<RemoteRoutine>, GatewayError> {
        Ok(self
            .routines
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert_exercise(
        &self,
        exercise: &NewExercise,
    ) -> Result<RemoteExercise, GatewayError> {
        self.insert_exercise_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_exercise.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        let mut table = self.exercises.lock().unwrap();
        // Upsert on the client key, like the production interface
        if let Some(existing) = table
            .iter()
            .find(|e| e.client_key == Some(exercise.client_key))
        {
            return Ok(existing.clone());
        }
        let row = RemoteExercise {
            id: self.next_remote_id(),
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
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.exercises.lock().unwrap().retain(|e| e.id != id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn insert_session(&self, session: &NewSession) -> Result<RemoteSession, GatewayError> {
        self.insert_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_session.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        let mut table = self.sessions.lock().unwrap();
        if let Some((_, id)) = table
            .iter()
            .find(|(s, _)| s.client_key == session.client_key)
        {
            return Ok(RemoteSession { id: id.clone() });
        }
        let id = self.next_remote_id();
        table.push((session.clone(), id.clone()));
        Ok(RemoteSession { id })
    }

    async fn insert_set(&self, set: &NewSet) -> Result<(), GatewayError> {
        self.insert_set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_set.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        let mut table = self.sets.lock().unwrap();
        match table.iter().position(|s| s.client_key == set.client_key) {
            Some(idx) => table[idx] = set.clone(),
            None => table.push(set.clone()),
        }
        Ok(())
    }

    async fn upload_image(&self, key: &str, _bytes: &[u8]) -> Result<String, GatewayError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        Ok(format!("https://cdn.example.com/{key}"))
    }
}
