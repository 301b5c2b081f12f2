use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Cached, ExerciseListItem, RemoteExercise, RemoteProfile, RemoteRoutine};
use crate::net::Connectivity;
use crate::remote::RemoteGateway;
use crate::staging::StagingStore;

/// Consider an entity collection stale after 5 minutes.
/// Balances freshness with keeping reads off the network on the hot path.
const DEFAULT_MAX_AGE_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    pub max_age: Duration,
    pub force_refresh: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::milliseconds(DEFAULT_MAX_AGE_MS),
            force_refresh: false,
        }
    }
}

impl CacheOptions {
    pub fn force_refresh() -> Self {
        Self {
            force_refresh: true,
            ..Self::default()
        }
    }
}

/// Result of a cache-first read.
#[derive(Debug, Clone)]
pub struct CollectionRead<T> {
    pub data: Vec<T>,
    pub served_from_cache: bool,
}

/// Cache-first resolver over the staging store and the remote gateway.
pub struct CacheFirst<G> {
    staging: Arc<StagingStore>,
    gateway: Arc<G>,
    connectivity: Connectivity,
}

impl<G: RemoteGateway> CacheFirst<G> {
    pub fn new(staging: Arc<StagingStore>, gateway: Arc<G>, connectivity: Connectivity) -> Self {
        Self {
            staging,
            gateway,
            connectivity,
        }
    }

    /// Combined exercise listing: unsynced local records first, then the
    /// cached or freshly fetched remote collection.
    pub async fn exercises(
        &self,
        owner_id: &str,
        options: CacheOptions,
    ) -> CollectionRead<ExerciseListItem> {
        let locals: Vec<ExerciseListItem> = self
            .staging
            .pending_exercises()
            .into_iter()
            .map(ExerciseListItem::Pending)
            .collect();

        let cached = self.staging.cached_exercises();

        if serve_cached(&cached, &options) {
            return CollectionRead {
                data: combine(locals, cached),
                served_from_cache: true,
            };
        }

        if !self.connectivity.is_online() {
            debug!(table = "exercises", "offline, serving cache of any age");
            return CollectionRead {
                data: combine(locals, cached),
                served_from_cache: true,
            };
        }

        match self.gateway.fetch_exercises(owner_id).await {
            Ok(rows) => {
                let now = Utc::now();
                let fresh: Vec<Cached<RemoteExercise>> = rows
                    .into_iter()
                    .map(|r| Cached {
                        data: r,
                        refreshed_at: now,
                    })
                    .collect();
                if let Err(e) = self.staging.put_cached_exercises(fresh.clone()) {
                    warn!(error = %e, "failed to persist refreshed exercise cache");
                }
                CollectionRead {
                    data: combine(locals, fresh),
                    served_from_cache: false,
                }
            }
            Err(e) => {
                warn!(table = "exercises", error = %e, "remote fetch failed, falling back to cache");
                CollectionRead {
                    data: combine(locals, cached),
                    served_from_cache: true,
                }
            }
        }
    }

    /// Routine listing. Routines are only created online in the source
    /// system, so there is no local pending component.
    pub async fn routines(
        &self,
        owner_id: &str,
        options: CacheOptions,
    ) -> CollectionRead<RemoteRoutine> {
        let cached = self.staging.cached_routines();

        if serve_cached(&cached, &options) {
            return CollectionRead {
                data: rows(cached),
                served_from_cache: true,
            };
        }

        if !self.connectivity.is_online() {
            return CollectionRead {
                data: rows(cached),
                served_from_cache: true,
            };
        }

        match self.gateway.fetch_routines(owner_id).await {
            Ok(fetched) => {
                let now = Utc::now();
                let fresh: Vec<Cached<RemoteRoutine>> = fetched
                    .into_iter()
                    .map(|r| Cached {
                        data: r,
                        refreshed_at: now,
                    })
                    .collect();
                if let Err(e) = self.staging.put_cached_routines(fresh.clone()) {
                    warn!(error = %e, "failed to persist refreshed routine cache");
                }
                CollectionRead {
                    data: rows(fresh),
                    served_from_cache: false,
                }
            }
            Err(e) => {
                warn!(table = "routines", error = %e, "remote fetch failed, falling back to cache");
                CollectionRead {
                    data: rows(cached),
                    served_from_cache: true,
                }
            }
        }
    }

    /// Single-row variant for the user profile.
    pub async fn profile(
        &self,
        user_id: &str,
        options: CacheOptions,
    ) -> (Option<RemoteProfile>, bool) {
        let cached = self.staging.cached_profile(user_id);

        if let Some(ref hit) = cached {
            if !options.force_refresh && age_of(hit.refreshed_at) < options.max_age {
                return (Some(hit.data.clone()), true);
            }
        }

        if !self.connectivity.is_online() {
            return (cached.map(|c| c.data), true);
        }

        match self.gateway.fetch_profile(user_id).await {
            Ok(Some(profile)) => {
                if let Err(e) = self.staging.put_cached_profile(Cached::new(profile.clone())) {
                    warn!(error = %e, "failed to persist refreshed profile cache");
                }
                (Some(profile), false)
            }
            Ok(None) => (None, false),
            Err(e) => {
                warn!(table = "profile", error = %e, "remote fetch failed, falling back to cache");
                (cached.map(|c| c.data), true)
            }
        }
    }
}

fn age_of(refreshed_at: DateTime<Utc>) -> Duration {
    Utc::now() - refreshed_at
}

/// A collection is served from cache when it exists, is not force-bypassed,
/// and its oldest row is younger than the max age.
fn serve_cached<T>(cached: &[Cached<T>], options: &CacheOptions) -> bool {
    if options.force_refresh || cached.is_empty() {
        return false;
    }
    match cached.iter().map(|c| c.refreshed_at).min() {
        Some(oldest) => age_of(oldest) < options.max_age,
        None => false,
    }
}

fn rows<T>(cached: Vec<Cached<T>>) -> Vec<T> {
    cached.into_iter().map(|c| c.data).collect()
}

fn combine(
    locals: Vec<ExerciseListItem>,
    cached: Vec<Cached<RemoteExercise>>,
) -> Vec<ExerciseListItem> {
    let mut out = locals;
    out.extend(cached.into_iter().map(|c| ExerciseListItem::Cached(c.data)));
    out
}

// ============================================================================
// Tests
// ============================================================================
