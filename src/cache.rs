use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default sliding TTL and sweep cadence, in seconds. One hour each.
pub const DEFAULT_TTL_SECS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

struct CacheItem {
    value: Vec<u8>,
    last_access: Instant,
}

struct Inner {
    ttl: Duration,
    items: Mutex<HashMap<String, CacheItem>>,
}

impl Inner {
    /// Evict every item whose last access is older than the TTL. Returns
    /// how many items were dropped. The lock is held only for the pass.
    fn sweep(&self) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|_, item| item.last_access.elapsed() < self.ttl);
        before - items.len()
    }
}

/// Time-boxed cache of rendered report artifacts.
///
/// Reads refresh an entry's last-access time (sliding TTL); a background
/// sweeper evicts entries that have gone unread for longer than the TTL.
/// Cloning is cheap and all clones share one map. Concurrent readers,
/// writers and the sweeper serialize on one mutex; critical sections are
/// a map probe or one eviction pass.
#[derive(Clone)]
pub struct ReportCache {
    inner: Arc<Inner>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                items: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Cached bytes for `key`, refreshing its last-access time.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut items = self.inner.items.lock();
        let item = items.get_mut(key)?;
        item.last_access = Instant::now();
        Some(item.value.clone())
    }

    /// Insert or overwrite an entry, with the current time as last access.
    pub fn set(&self, key: &str, value: Vec<u8>) {
        let mut items = self.inner.items.lock();
        items.insert(
            key.to_string(),
            CacheItem {
                value,
                last_access: Instant::now(),
            },
        );
    }

    /// Existence probe. Does not refresh the entry's last-access time.
    pub fn exists(&self, key: &str) -> bool {
        self.inner.items.lock().contains_key(key)
    }

    /// Spawn the periodic sweeper for this cache. The task exits on its
    /// own once every handle to the cache has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else { break };
                let evicted = inner.sweep();
                if evicted > 0 {
                    debug!(evicted, "report cache sweep");
                }
            }
        })
    }
}
