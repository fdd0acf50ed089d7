//! Generic TTL+LRU bounded cache.
//!
//! One instance per concern (search results, answers, cards, evidence
//! packs, duration-agent outputs) so churn in one concern cannot evict
//! another's entries. All mutation happens under a single mutex; entries
//! are small and counts stay in the tens to hundreds, so the O(len) prune
//! under the lock is acceptable.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

struct Slot<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<V> {
    map: HashMap<String, Slot<V>>,
    /// Keys from least- to most-recently used.
    order: VecDeque<String>,
}

/// Bounded cache evicting by both time-to-live and least-recent-use.
///
/// `get` never returns an entry past its expiry; a hit is promoted to
/// most-recently-used and handed out as a clone so callers cannot mutate
/// cached state. `set` always refreshes both the TTL and the LRU position.
pub struct TtlLruCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
    max_size: usize,
}

impl<V: Clone> TtlLruCache<V> {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        TtlLruCache {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl,
            max_size,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let expired = match inner.map.get(key) {
            Some(slot) => Instant::now() > slot.expires_at,
            None => return None,
        };
        if expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
            trace!(key, "cache entry expired");
            return None;
        }
        promote(&mut inner.order, key);
        inner.map.get(key).map(|slot| slot.value.clone())
    }

    pub fn set(&self, key: &str, value: V) {
        let mut inner = self.lock();
        inner.map.insert(
            key.to_string(),
            Slot {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
        promote(&mut inner.order, key);
        self.prune(&mut inner);
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries first, then evict least-recently-used entries
    /// until the size bound holds.
    fn prune(&self, inner: &mut Inner<V>) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, slot)| now > slot.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
        }
        while inner.map.len() > self.max_size {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.map.remove(&oldest);
            trace!(key = %oldest, "cache entry evicted");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Move `key` to the most-recently-used end, appending it if absent.
fn promote(order: &mut VecDeque<String>, key: &str) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        order.remove(pos);
    }
    order.push_back(key.to_string());
}
