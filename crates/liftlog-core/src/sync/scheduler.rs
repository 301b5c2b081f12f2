use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::net::Connectivity;
use crate::remote::RemoteGateway;
use crate::staging::StagingStore;

use super::{SyncEngine, SyncOutcome};

/// A startup whose last full sync is younger than this skips the initial
/// sync entirely.
const STARTUP_RESYNC_HOURS: i64 = 4;

/// Background full-sync cadence while the app stays open.
const PERIODIC_SYNC_MINUTES: u64 = 30;

/// Explicit scheduler state. Two concurrent syncs are unrepresentable:
/// `try_begin` is the only way in, and it refuses while `Syncing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Syncing,
}

/// Decides when the sync engine runs.
///
/// Triggers: startup (guarded by the persisted last-full-sync timestamp),
/// network reconnect (unconditional), app foreground and periodic timer
/// (both gated on a completed initial sync and current connectivity), and
/// manual user action. A trigger that fires while a sync is in flight is
/// dropped, not queued - the next trigger re-attempts anyway.
pub struct SyncScheduler<G> {
    engine: SyncEngine<G>,
    staging: Arc<StagingStore>,
    connectivity: Connectivity,
    state: Mutex<SchedulerState>,
    initial_sync_done: AtomicBool,
}

impl<G: RemoteGateway> SyncScheduler<G> {
    pub fn new(
        engine: SyncEngine<G>,
        staging: Arc<StagingStore>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            engine,
            staging,
            connectivity,
            state: Mutex::new(SchedulerState::Idle),
            initial_sync_done: AtomicBool::new(false),
        }
    }

    pub fn is_syncing(&self) -> bool {
        *self.lock_state() == SchedulerState::Syncing
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// App start. Runs a full sync unless one completed recently enough.
    pub async fn on_startup(&self) -> Result<Option<SyncOutcome>> {
        if let Some(last) = self.staging.last_full_sync() {
            if Utc::now() - last < Duration::hours(STARTUP_RESYNC_HOURS) {
                debug!(%last, "startup sync skipped, last full sync is recent");
                return Ok(None);
            }
        }
        self.run_guarded("startup").await
    }

    /// Connectivity regained. Pending writes are most urgent here, so no
    /// gating beyond the overlap guard.
    pub async fn on_reconnect(&self) -> Result<Option<SyncOutcome>> {
        self.run_guarded("reconnect").await
    }

    /// App brought to the foreground. Skipped until the initial sync has
    /// completed once this process lifetime, so start + foreground firing
    /// together cannot double-sync.
    pub async fn on_foreground(&self) -> Result<Option<SyncOutcome>> {
        if !self.initial_sync_done.load(Ordering::SeqCst) {
            debug!("foreground sync skipped, no initial sync yet");
            return Ok(None);
        }
        if !self.connectivity.is_online() {
            return Ok(None);
        }
        self.run_guarded("foreground").await
    }

    /// Periodic timer tick, same gating as foreground.
    pub async fn on_timer(&self) -> Result<Option<SyncOutcome>> {
        if !self.initial_sync_done.load(Ordering::SeqCst) || !self.connectivity.is_online() {
            return Ok(None);
        }
        self.run_guarded("periodic").await
    }

    /// Explicit user action. `None` means a sync was already in flight.
    pub async fn manual_sync(&self) -> Result<Option<SyncOutcome>> {
        self.run_guarded("manual").await
    }

    async fn run_guarded(&self, trigger: &'static str) -> Result<Option<SyncOutcome>> {
        if !self.try_begin() {
            debug!(trigger, "sync already in progress, dropping trigger");
            return Ok(None);
        }
        info!(trigger, "starting sync");
        let result = self.engine.sync_all().await;
        self.finish();

        match result {
            Ok(outcome) => {
                if let SyncOutcome::Completed(_) = outcome {
                    self.initial_sync_done.store(true, Ordering::SeqCst);
                    if let Err(e) = self.staging.set_last_full_sync(Utc::now()) {
                        warn!(error = %e, "failed to persist last-full-sync timestamp");
                    }
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                // The syncing flag is already cleared, so later triggers
                // retry normally
                warn!(trigger, error = %e, "sync failed");
                Err(e)
            }
        }
    }

    fn try_begin(&self) -> bool {
        let mut state = self.lock_state();
        match *state {
            SchedulerState::Idle => {
                *state = SchedulerState::Syncing;
                true
            }
            SchedulerState::Syncing => false,
        }
    }

    fn finish(&self) {
        *self.lock_state() = SchedulerState::Idle;
    }

    /// Drive the periodic timer and reconnect-edge triggers. Spawn this
    /// from the embedding application; it runs until the connectivity
    /// channel closes.
    pub async fn run(self: Arc<Self>) {
        let mut online_rx = self.connectivity.subscribe();
        let mut was_online = self.connectivity.is_online();
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(PERIODIC_SYNC_MINUTES * 60));
        // The immediate first tick would race the startup trigger
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.on_timer().await {
                        warn!(error = %e, "periodic sync failed");
                    }
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online && !was_online {
                        if let Err(e) = self.on_reconnect().await {
                            warn!(error = %e, "reconnect sync failed");
                        }
                    }
                    was_online = online;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExerciseDraft;
    use crate::models::ExerciseKind;
    use crate::remote::testing::MockGateway;
    use std::sync::atomic::Ordering as AtomicOrdering;
    use tempfile::TempDir;

    const OWNER: &str = "user-1";

    fn setup(online: bool) -> (TempDir, Arc<StagingStore>, Arc<MockGateway>, SyncScheduler<MockGateway>) {
        let dir = TempDir::new().unwrap();
        let staging = Arc::new(StagingStore::open(dir.path()).unwrap());
        let gateway = Arc::new(MockGateway::signed_in(OWNER));
        let connectivity = Connectivity::new(online);
        let engine = SyncEngine::new(staging.clone(), gateway.clone(), connectivity.clone());
        let scheduler = SyncScheduler::new(engine, staging.clone(), connectivity);
        (dir, staging, gateway, scheduler)
    }

    fn stage_exercise(staging: &StagingStore) {
        staging
            .add_exercise(ExerciseDraft {
                name: "Bench Press".to_string(),
                kind: ExerciseKind::Strength,
                description: String::new(),
                favorite: false,
                muscle_group: "chest".to_string(),
                photo_base64: None,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_startup_syncs_when_never_synced() {
        let (_dir, staging, gateway, scheduler) = setup(true);
        stage_exercise(&staging);

        let outcome = scheduler.on_startup().await.unwrap();
        assert!(matches!(outcome, Some(SyncOutcome::Completed(_))));
        assert_eq!(gateway.insert_exercise_calls.load(AtomicOrdering::SeqCst), 1);
        assert!(staging.last_full_sync().is_some());
    }

    #[tokio::test]
    async fn test_startup_guard_skips_recent_sync() {
        let (_dir, staging, gateway, scheduler) = setup(true);
        staging
            .set_last_full_sync(Utc::now() - Duration::hours(1))
            .unwrap();

        let outcome = scheduler.on_startup().await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(gateway.fetch_exercise_calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_startup_guard_expires_after_interval() {
        let (_dir, staging, gateway, scheduler) = setup(true);
        staging
            .set_last_full_sync(Utc::now() - Duration::hours(5))
            .unwrap();

        let outcome = scheduler.on_startup().await.unwrap();
        assert!(matches!(outcome, Some(SyncOutcome::Completed(_))));
        assert_eq!(gateway.fetch_exercise_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreground_gated_until_initial_sync() {
        let (_dir, _staging, gateway, scheduler) = setup(true);

        let outcome = scheduler.on_foreground().await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(gateway.fetch_exercise_calls.load(AtomicOrdering::SeqCst), 0);

        scheduler.manual_sync().await.unwrap();
        let outcome = scheduler.on_foreground().await.unwrap();
        assert!(matches!(outcome, Some(SyncOutcome::Completed(_))));
    }

    #[tokio::test]
    async fn test_foreground_skipped_while_offline() {
        let (_dir, _staging, _gateway, scheduler) = setup(true);
        scheduler.manual_sync().await.unwrap();

        scheduler.connectivity.set_online(false);
        let outcome = scheduler.on_foreground().await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_timer_gated_like_foreground() {
        let (_dir, _staging, gateway, scheduler) = setup(true);
        assert!(scheduler.on_timer().await.unwrap().is_none());

        scheduler.manual_sync().await.unwrap();
        assert!(scheduler.on_timer().await.unwrap().is_some());
        assert_eq!(gateway.fetch_exercise_calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_dropped() {
        let (_dir, _staging, _gateway, scheduler) = setup(true);

        // Hold the state in Syncing, as if a sync were in flight
        assert!(scheduler.try_begin());
        assert!(scheduler.is_syncing());

        let outcome = scheduler.manual_sync().await.unwrap();
        assert!(outcome.is_none(), "trigger during sync must be dropped");

        scheduler.finish();
        let outcome = scheduler.manual_sync().await.unwrap();
        assert!(outcome.is_some());
    }

    #[tokio::test]
    async fn test_no_identity_does_not_mark_initial_sync() {
        let (_dir, _staging, gateway, scheduler) = setup(true);
        *gateway.identity.lock().unwrap() = None;

        let outcome = scheduler.manual_sync().await.unwrap();
        assert_eq!(outcome, Some(SyncOutcome::NoIdentity));
        // A no-op sync does not unlock foreground/periodic triggers
        assert!(scheduler.on_foreground().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_manual_sync_reports_offline() {
        let (_dir, staging, _gateway, scheduler) = setup(false);
        stage_exercise(&staging);

        let outcome = scheduler.manual_sync().await.unwrap();
        assert_eq!(outcome, Some(SyncOutcome::Offline));
        assert!(staging.last_full_sync().is_none());
    }
}
