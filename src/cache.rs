//! In-memory TTL cache with a background sweeper.
//!
//! Expiry is checked lazily on every read, so an entry past its deadline is
//! invisible immediately even if the sweeper has not run yet. The sweeper only
//! reclaims memory from abandoned keys. It runs on its own tokio task and is
//! stopped when the owning [`ExpiringCache`] is dropped.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::trace;

/// How often expired entries are swept when no interval is given.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` means the entry never expires.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

type Entries<V> = DashMap<String, CacheEntry<V>>;

/// String-keyed cache where every entry carries an absolute deadline.
///
/// Must be constructed inside a tokio runtime, since construction spawns the
/// sweeper task.
pub struct ExpiringCache<V> {
    entries: Arc<Entries<V>>,
    ttl: Duration,
    _sweeper: DropGuard,
}

impl<V> ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache whose `set` uses `ttl`, sweeping once a minute.
    pub fn new(ttl: Duration) -> Self {
        Self::with_sweep_interval(ttl, DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(ttl: Duration, sweep_interval: Duration) -> Self {
        let entries: Arc<Entries<V>> = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();

        tokio::spawn(sweep_loop(
            Arc::downgrade(&entries),
            sweep_interval,
            cancel.clone(),
        ));

        Self {
            entries,
            ttl,
            _sweeper: cancel.drop_guard(),
        }
    }

    /// Store `value` under `key` with the default TTL, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, Some(self.ttl));
    }

    /// Store `value` with an explicit TTL. `None` keeps the entry until it is
    /// deleted or the cache is cleared.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Return the value for `key` if present and not yet expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones the sweeper has not
    /// reclaimed yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Default TTL applied by [`ExpiringCache::set`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Remove every entry whose deadline has passed. Returns how many were removed.
fn sweep<V>(entries: &Entries<V>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before.saturating_sub(entries.len())
}

async fn sweep_loop<V>(
    entries: Weak<Entries<V>>,
    sweep_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = sweep(&entries, Instant::now());
                if removed > 0 {
                    trace!(removed, remaining = entries.len(), "swept expired cache entries");
                }
            }
        }
    }
}
