use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use jiff::{SignedDuration, Timestamp};
use tracing::{info, warn};

use crate::{
    database::{keys, Database, Trial},
    outbound::TrialSource,
    search::{self, FilterCategory},
};

#[cfg(test)]
pub(crate) const DEFAULT_TTL: SignedDuration =
    SignedDuration::from_mins(crate::settings::DEFAULT_CACHE_TTL_MINUTES);

/// The last trial list fetched, with the time it was fetched.
#[derive(Clone)]
pub(crate) struct TrialCache {
    db: Database,
    ttl: SignedDuration,
}

impl TrialCache {
    pub(crate) fn new(db: Database, ttl: SignedDuration) -> Self {
        Self { db, ttl }
    }

    fn read(&self) -> Option<(Vec<Trial>, Timestamp)> {
        let read = || -> Result<Option<(Vec<Trial>, Timestamp)>> {
            let Some(stamp) = self.db.get::<Timestamp>(keys::TRIALS_CACHE_TIMESTAMP)? else {
                return Ok(None);
            };
            let Some(trials) = self.db.get::<Vec<Trial>>(keys::TRIALS_CACHE)? else {
                return Ok(None);
            };
            Ok(Some((trials, stamp)))
        };
        read().unwrap_or_else(|e| {
            warn!("Ignoring unreadable trial cache: {e:#}");
            None
        })
    }

    /// The cached list if it was fetched less than the TTL before `now`.
    pub(crate) fn fresh(&self, now: Timestamp) -> Option<Vec<Trial>> {
        let (trials, stamp) = self.read()?;
        (now.duration_since(stamp) < self.ttl).then_some(trials)
    }

    /// Best-effort write; failures are logged and otherwise ignored.
    ///
    /// The drug names of the list are stored alongside for filter pickers.
    pub(crate) fn store(&self, trials: &[Trial], now: Timestamp) {
        let write = || -> Result<()> {
            self.db.set(keys::TRIALS_CACHE, trials)?;
            self.db.set(keys::TRIALS_CACHE_TIMESTAMP, &now)?;
            self.db.set(
                keys::DRUG_NAMES,
                &search::distinct_values(trials, FilterCategory::PrimaryDrugs),
            )
        };
        if let Err(e) = write() {
            warn!("Failed to write trial cache: {e:#}");
        }
    }
}

/// Logs every write of the cache timestamp, whichever path made it.
///
/// The watcher runs on a detached thread for the life of the process.
pub(crate) fn log_updates(db: &Database) {
    let mut changes = db.subscribe(keys::TRIALS_CACHE_TIMESTAMP);
    std::thread::spawn(move || loop {
        match changes.next_change::<Timestamp>(Duration::from_secs(60)) {
            Ok(Some(Some(at))) => info!("Trial cache updated with data fetched at {at}"),
            Ok(Some(None)) => info!("Trial cache cleared"),
            Ok(None) => {}
            Err(e) => warn!("Unreadable trial cache timestamp: {e:#}"),
        }
    });
}

/// Serves the trial list from the cache when fresh, from the source
/// otherwise.
pub(crate) struct TrialService<S> {
    cache: TrialCache,
    source: Arc<S>,
    /// Set while a background refresh runs.
    refreshing: Arc<AtomicBool>,
}

impl<S> Clone for TrialService<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            source: Arc::clone(&self.source),
            refreshing: Arc::clone(&self.refreshing),
        }
    }
}

/// Clears the in-flight flag when the background refresh ends.
struct RefreshGuard(Arc<AtomicBool>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: TrialSource> TrialService<S> {
    pub(crate) fn new(cache: TrialCache, source: S) -> Self {
        Self {
            cache,
            source: Arc::new(source),
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the trial list.
    ///
    /// A fresh cache is returned at once and refreshed by a background task
    /// whose failures are only logged. At most one background refresh runs
    /// at a time. Otherwise the list is fetched before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is missing or stale and the fetch fails.
    pub(crate) async fn trials(&self, now: Timestamp) -> Result<Vec<Trial>> {
        if let Some(trials) = self.cache.fresh(now) {
            if self
                .refreshing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let guard = RefreshGuard(Arc::clone(&self.refreshing));
                let service = self.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    match service.source.fetch_trials().await {
                        Ok(trials) => service.cache.store(&trials, now),
                        Err(e) => warn!("Background trial refresh failed: {e:#}"),
                    }
                });
            }
            return Ok(trials);
        }
        self.refresh(now).await
    }

    /// Fetches the trial list and writes it to the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails. The cache is left as it was.
    pub(crate) async fn refresh(&self, now: Timestamp) -> Result<Vec<Trial>> {
        let trials = self.source.fetch_trials().await?;
        self.cache.store(&trials, now);
        info!("Trial cache refreshed with {} trials", trials.len());
        Ok(trials)
    }
}
