use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine as _;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{Cached, PendingExercise, PendingSet};
use crate::net::Connectivity;
use crate::remote::{Identity, NewExercise, NewSession, NewSet, RemoteGateway};
use crate::staging::StagingStore;

/// Per-invocation summary of what the engine accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub exercises_synced: usize,
    pub deletions_synced: usize,
    pub sessions_synced: usize,
    pub sets_synced: usize,
    /// True when every cached collection refreshed without error.
    pub cache_refreshed: bool,
    /// Records still awaiting upload after this invocation.
    pub remaining_pending: usize,
}

/// How a sync invocation ended. `Offline` and `NoIdentity` are expected
/// operating modes, not failures: nothing was mutated and nothing was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Offline,
    NoIdentity,
}

/// Reconciles the staging store against the remote store.
///
/// Phase 1 drains pending writes (creates, deletions, sessions with their
/// sets), phase 2 refreshes the entity cache. The order is load-bearing:
/// refreshing first could cache state that predates the pending writes and
/// make a just-created record appear to vanish or duplicate once it
/// round-trips.
///
/// Safe to re-invoke at any time: each record's state transition is atomic
/// and independent, so an interrupted run leaves some records synced and the
/// rest pending, never corruption. Delivery is at-least-once; inserts carry
/// client keys so replays cannot duplicate rows.
pub struct SyncEngine<G> {
    staging: Arc<StagingStore>,
    gateway: Arc<G>,
    connectivity: Connectivity,
}

impl<G: RemoteGateway> SyncEngine<G> {
    pub fn new(staging: Arc<StagingStore>, gateway: Arc<G>, connectivity: Connectivity) -> Self {
        Self {
            staging,
            gateway,
            connectivity,
        }
    }

    /// Run both phases. Individual record failures are logged and left for
    /// the next cycle; only identity resolution and local storage failures
    /// abort the run.
    pub async fn sync_all(&self) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            debug!("skipping sync, offline");
            return Ok(SyncOutcome::Offline);
        }

        let identity = self
            .gateway
            .current_identity()
            .await
            .context("failed to resolve identity")?;
        let Some(identity) = identity else {
            debug!("skipping sync, no authenticated identity");
            return Ok(SyncOutcome::NoIdentity);
        };

        let mut report = SyncReport::default();

        self.drain_exercises(&identity, &mut report).await?;
        self.drain_deletions(&mut report).await?;
        self.drain_sessions(&identity, &mut report).await?;
        report.cache_refreshed = self.refresh_cache(&identity).await?;
        report.remaining_pending = self.staging.pending_stats().total();

        info!(
            exercises = report.exercises_synced,
            deletions = report.deletions_synced,
            sessions = report.sessions_synced,
            sets = report.sets_synced,
            remaining = report.remaining_pending,
            "sync complete"
        );
        Ok(SyncOutcome::Completed(report))
    }

    async fn drain_exercises(&self, identity: &Identity, report: &mut SyncReport) -> Result<()> {
        let pending = self.staging.pending_exercises();
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "draining pending exercises");

        for exercise in pending {
            let photo_url = self.upload_photo(&exercise).await;
            let payload = NewExercise {
                client_key: exercise.client_key,
                owner_id: identity.id.clone(),
                name: exercise.name.clone(),
                kind: exercise.kind.to_string(),
                description: exercise.description.clone(),
                favorite: exercise.favorite,
                muscle_group: exercise.muscle_group.clone(),
                icon: exercise.kind.icon().to_string(),
                photo_url,
            };
            match self.gateway.insert_exercise(&payload).await {
                Ok(_) => {
                    self.staging
                        .mark_exercise_synced(exercise.local_id)
                        .context("failed to mark exercise synced")?;
                    report.exercises_synced += 1;
                }
                Err(e) => {
                    warn!(local_id = exercise.local_id, error = %e, "exercise insert failed, will retry");
                }
            }
        }
        Ok(())
    }

    /// Upload the staged image, if any. Upload failure is not fatal to the
    /// record: the exercise syncs with no photo and the upload is retried
    /// naturally if the insert itself also failed.
    async fn upload_photo(&self, exercise: &PendingExercise) -> Option<String> {
        let encoded = exercise.photo_base64.as_deref()?;
        let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(local_id = exercise.local_id, error = %e, "undecodable photo payload, syncing without it");
                return None;
            }
        };
        let key = format!("{}.jpg", exercise.client_key);
        match self.gateway.upload_image(&key, &bytes).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(local_id = exercise.local_id, error = %e, "photo upload failed, syncing without it");
                None
            }
        }
    }

    async fn drain_deletions(&self, report: &mut SyncReport) -> Result<()> {
        for deletion in self.staging.pending_deletions() {
            match self.gateway.delete_exercise(&deletion.target_id).await {
                // A target already gone remotely counts as deleted
                Ok(()) | Err(crate::remote::GatewayError::NotFound(_)) => {
                    self.staging
                        .mark_deletion_synced(deletion.local_id)
                        .context("failed to mark deletion synced")?;
                    report.deletions_synced += 1;
                }
                Err(e) => {
                    warn!(target = %deletion.target_id, error = %e, "remote delete failed, will retry");
                }
            }
        }
        Ok(())
    }

    async fn drain_sessions(&self, identity: &Identity, report: &mut SyncReport) -> Result<()> {
        // Recovery first: sets stranded by an earlier cycle that synced the
        // header but lost some set inserts.
        for set in self.staging.pending_sets_with_remote_ref() {
            let Some(remote_session_id) = set.remote_session_id.clone() else {
                continue;
            };
            self.try_insert_set(&set, &remote_session_id, report).await?;
        }

        for session in self.staging.pending_sessions() {
            let payload = NewSession {
                client_key: session.client_key,
                owner_id: identity.id.clone(),
                routine_name: session.routine_name.clone(),
                duration_minutes: session.duration_minutes,
                rest_seconds_total: session.rest_seconds_total,
                performed_at: session.created_at,
            };
            let remote = match self.gateway.insert_session(&payload).await {
                Ok(remote) => remote,
                Err(e) => {
                    // Header failed: none of this session's sets are
                    // attempted, the whole unit retries next cycle
                    warn!(local_id = session.local_id, error = %e, "session insert failed, will retry");
                    continue;
                }
            };

            let sets = self.staging.pending_sets_for(session.local_id);
            // Stamp the resolved remote id on every set before attempting
            // inserts, so an interruption below cannot strand them
            for set in &sets {
                self.staging
                    .set_set_remote_session(set.local_id, &remote.id)
                    .context("failed to record remote session reference")?;
            }
            for set in &sets {
                self.try_insert_set(set, &remote.id, report).await?;
            }

            self.staging
                .mark_session_synced(session.local_id)
                .context("failed to mark session synced")?;
            report.sessions_synced += 1;
        }
        Ok(())
    }

    async fn try_insert_set(
        &self,
        set: &PendingSet,
        remote_session_id: &str,
        report: &mut SyncReport,
    ) -> Result<()> {
        let payload = NewSet {
            client_key: set.client_key,
            session_id: remote_session_id.to_string(),
            exercise_id: set.exercise_id.clone(),
            set_index: set.set_index,
            reps: set.reps,
            weight_kg: set.weight_kg,
            completed: set.completed,
        };
        match self.gateway.insert_set(&payload).await {
            Ok(()) => {
                self.staging
                    .mark_set_synced(set.local_id)
                    .context("failed to mark set synced")?;
                report.sets_synced += 1;
            }
            Err(e) => {
                warn!(local_id = set.local_id, error = %e, "set insert failed, will retry");
            }
        }
        Ok(())
    }

    /// Phase 2: overwrite the entity cache from a full remote snapshot.
    /// Runs after phase 1 regardless of how much of it succeeded. A failed
    /// collection is skipped so the others still refresh.
    async fn refresh_cache(&self, identity: &Identity) -> Result<bool> {
        let now = Utc::now();
        let mut complete = true;

        match self.gateway.fetch_profile(&identity.id).await {
            Ok(Some(profile)) => {
                self.staging
                    .put_cached_profile(Cached {
                        data: profile,
                        refreshed_at: now,
                    })
                    .context("failed to cache profile")?;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "profile refresh failed");
                complete = false;
            }
        }

        match self.gateway.fetch_exercises(&identity.id).await {
            Ok(rows) => {
                self.staging
                    .put_cached_exercises(
                        rows.into_iter()
                            .map(|r| Cached {
                                data: r,
                                refreshed_at: now,
                            })
                            .collect(),
                    )
                    .context("failed to cache exercises")?;
            }
            Err(e) => {
                warn!(error = %e, "exercise refresh failed");
                complete = false;
            }
        }

        match self.gateway.fetch_routines(&identity.id).await {
            Ok(rows) => {
                self.staging
                    .put_cached_routines(
                        rows.into_iter()
                            .map(|r| Cached {
                                data: r,
                                refreshed_at: now,
                            })
                            .collect(),
                    )
                    .context("failed to cache routines")?;
            }
            Err(e) => {
                warn!(error = %e, "routine refresh failed");
                complete = false;
            }
        }

        Ok(complete)
    }
}

// ============================================================================
// Tests
// ============================================================================
