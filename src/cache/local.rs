use super::{CacheStore, CacheValue, jittered_ttl};
use crate::error::{BloomError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sweep period when the cache has no default TTL.
pub const DEFAULT_SWEEP_SECS: u64 = 60;

type ExpireFn = Box<dyn Fn(&str, &CacheValue) + Send + Sync>;

struct Entry {
    value: CacheValue,
    ttl_secs: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process cache with sliding expiry.
///
/// Every successful read pushes the entry's deadline forward by a freshly
/// jittered TTL. Entries past their deadline read as absent but stay in the
/// map until [`purge_expired`](LocalCache::purge_expired) runs, which is
/// also when the expiry callback fires.
pub struct LocalCache<R = StdRng> {
    entries: Mutex<HashMap<String, Entry>>,
    rng: Mutex<R>,
    default_ttl_secs: u64,
    on_expire: Option<ExpireFn>,
}

impl LocalCache<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for LocalCache<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> LocalCache<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
            default_ttl_secs: 0,
            on_expire: None,
        }
    }

    /// TTL used by [`CacheStore::set`]; zero disables expiry.
    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// Called once per entry removed by a purge, after the lock is released.
    pub fn on_expire<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &CacheValue) + Send + Sync + 'static,
    {
        self.on_expire = Some(Box::new(f));
        self
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Half the default TTL, or [`DEFAULT_SWEEP_SECS`] without one.
    pub fn sweep_interval(&self) -> Duration {
        if self.default_ttl_secs == 0 {
            Duration::from_secs(DEFAULT_SWEEP_SECS)
        } else {
            Duration::from_millis(self.default_ttl_secs * 500)
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }

    /// Remove every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_at(Instant::now())
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries.lock().map_err(|e| {
            BloomError::LockError(format!("Cache lock error: {}", e))
        })
    }

    fn deadline(&self, now: Instant, ttl_secs: u64) -> Result<Option<Instant>> {
        if ttl_secs == 0 {
            return Ok(None);
        }
        let mut rng = self.rng.lock().map_err(|e| {
            BloomError::LockError(format!("Cache rng lock error: {}", e))
        })?;
        let secs = jittered_ttl(&mut *rng, ttl_secs);
        Ok(Some(now + Duration::from_secs(secs)))
    }

    fn set_at(
        &self,
        key: &str,
        value: CacheValue,
        ttl_secs: u64,
        now: Instant,
    ) -> Result<()> {
        let entry = Entry {
            value,
            ttl_secs,
            expires_at: self.deadline(now, ttl_secs)?,
        };
        self.entries()?.insert(key.to_owned(), entry);
        Ok(())
    }

    fn get_at(&self, key: &str, now: Instant) -> Result<Option<CacheValue>> {
        let mut entries = self.entries()?;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            return Ok(None);
        }
        entry.expires_at = self.deadline(now, entry.ttl_secs)?;
        Ok(Some(entry.value.clone()))
    }

    fn purge_at(&self, now: Instant) -> Result<usize> {
        let expired: Vec<(String, Entry)> = {
            let mut entries = self.entries()?;
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| entries.remove_entry(&key))
                .collect()
        };

        if let Some(on_expire) = &self.on_expire {
            for (key, entry) in &expired {
                on_expire(key, &entry.value);
            }
        }
        Ok(expired.len())
    }
}

impl<R: Rng + Send + 'static> LocalCache<R> {
    /// Purge expired entries on a background thread every
    /// [`sweep_interval`](LocalCache::sweep_interval).
    ///
    /// The thread holds only a weak reference and exits once the cache is
    /// dropped or the returned handle is stopped or dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let cache = Arc::downgrade(self);
        let interval = self.sweep_interval();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = thread::spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                match cache.purge_expired() {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "Purged expired cache entries"),
                    Err(e) => warn!(error = %e, "Cache sweep failed"),
                }
            }
            debug!("Cache sweeper stopped");
        });

        SweeperHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
        }
    }
}

impl<R: Rng + Send> CacheStore for LocalCache<R> {
    fn set(&self, key: &str, value: CacheValue) -> Result<()> {
        self.set_at(key, value, self.default_ttl_secs, Instant::now())
    }

    fn set_with_expire(
        &self,
        key: &str,
        value: CacheValue,
        ttl_secs: u64,
    ) -> Result<()> {
        self.set_at(key, value, ttl_secs, Instant::now())
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.get_at(key, Instant::now())
    }

    fn del(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

impl<R> std::fmt::Debug for LocalCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.lock().map(|e| e.len()).ok();
        f.debug_struct("LocalCache")
            .field("entries", &len)
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("has_on_expire", &self.on_expire.is_some())
            .finish()
    }
}

/// Stops the background sweeper when stopped or dropped.
pub struct SweeperHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("Cache sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
