//! Bounded memo of synthesized gamma ramps.
//!
//! Entries expire a fixed time after creation (TTL) and the least recently
//! accessed entries are evicted once the cache grows past capacity. Each
//! entry owns a per-key slot mutex: the first thread to miss on a key
//! synthesizes while holding only that slot, so concurrent misses on the same
//! key wait for one result instead of synthesizing twice, and the map lock is
//! never held across synthesis.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::color::ramp::GammaRamp;
use crate::time::Clock;

/// Composite synthesis key.
///
/// Brightness and contrast are quantized to thousandths so float noise does
/// not split otherwise identical keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RampKey {
    pub kelvin: u32,
    brightness_milli: u32,
    contrast_milli: u32,
    pub profile: u64,
}

impl RampKey {
    pub fn new(kelvin: u32, brightness: f32, contrast: f32, profile: u64) -> Self {
        let quantize = |v: f32| (v.max(0.0) * 1000.0).round() as u32;
        Self {
            kelvin,
            brightness_milli: quantize(brightness),
            contrast_milli: quantize(contrast),
            profile,
        }
    }

    pub fn brightness(&self) -> f32 {
        self.brightness_milli as f32 / 1000.0
    }

    pub fn contrast(&self) -> f32 {
        self.contrast_milli as f32 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub evictions: u64,
    pub expirations: u64,
}

/// What one maintenance pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
}

type Slot = Arc<Mutex<Option<Arc<GammaRamp>>>>;

struct Entry {
    slot: Slot,
    created: DateTime<Utc>,
    last_access: DateTime<Utc>,
    // Position in the LRU order
    tick: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RampKey, Entry>,
    // Access tick -> key; the first element is the least recently used
    order: BTreeMap<u64, RampKey>,
    next_tick: u64,
}

impl Inner {
    fn touch(&mut self, key: &RampKey, now: DateTime<Utc>) {
        let tick = self.next_tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.tick);
            entry.tick = tick;
            entry.last_access = now;
            self.order.insert(tick, *key);
            self.next_tick += 1;
        }
    }

    fn remove(&mut self, key: &RampKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry)
    }

    fn evict_over(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > capacity {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    fn expire(&mut self, now: DateTime<Utc>, ttl: ChronoDuration) -> usize {
        let stale: Vec<RampKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| now - entry.created >= ttl)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            self.remove(key);
        }
        stale.len()
    }
}

pub struct GammaRampCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl GammaRampCache {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the ramp for `key`, running `synthesize` only on a miss.
    ///
    /// A failed synthesis is returned to the caller and nothing is cached.
    pub fn get_or_compute<F, E>(&self, key: RampKey, synthesize: F) -> Result<Arc<GammaRamp>, E>
    where
        F: FnOnce() -> Result<GammaRamp, E>,
    {
        let now = self.clock.now();

        let slot = {
            let mut inner = self.lock();

            let expired = inner
                .entries
                .get(&key)
                .is_some_and(|entry| now - entry.created >= self.ttl);
            if expired {
                inner.remove(&key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }

            inner.touch(&key, now);
            match inner.entries.get(&key) {
                Some(entry) => Arc::clone(&entry.slot),
                None => {
                    let slot: Slot = Arc::new(Mutex::new(None));
                    let tick = inner.next_tick;
                    inner.next_tick += 1;
                    inner.entries.insert(
                        key,
                        Entry {
                            slot: Arc::clone(&slot),
                            created: now,
                            last_access: now,
                            tick,
                        },
                    );
                    inner.order.insert(tick, key);
                    let evicted = inner.evict_over(self.capacity);
                    if evicted > 0 {
                        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
                    }
                    slot
                }
            }
        };

        // Per-key guard: concurrent misses on this key queue here
        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(ramp) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(ramp));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        match synthesize() {
            Ok(ramp) => {
                let ramp = Arc::new(ramp);
                *guard = Some(Arc::clone(&ramp));
                Ok(ramp)
            }
            Err(error) => {
                drop(guard);
                let mut inner = self.lock();
                let ours = inner
                    .entries
                    .get(&key)
                    .is_some_and(|entry| Arc::ptr_eq(&entry.slot, &slot));
                if ours {
                    inner.remove(&key);
                }
                Err(error)
            }
        }
    }

    /// Cached ramp for `key` without synthesizing or refreshing its LRU position.
    pub fn peek(&self, key: &RampKey) -> Option<Arc<GammaRamp>> {
        let slot = self.lock().entries.get(key).map(|entry| Arc::clone(&entry.slot))?;
        let guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Maintenance pass: drop expired entries first, then trim to capacity.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut inner = self.lock();
        let expired = inner.expire(now, self.ttl);
        let evicted = inner.evict_over(self.capacity);
        drop(inner);

        self.expirations.fetch_add(expired as u64, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        if expired + evicted > 0 {
            log_debug!("Ramp cache sweep: {expired} expired, {evicted} evicted");
        }
        SweepReport { expired, evicted }
    }

    pub fn contains(&self, key: &RampKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Last access time of `key`, if cached.
    pub fn last_access(&self, key: &RampKey) -> Option<DateTime<Utc>> {
        self.lock().entries.get(key).map(|entry| entry.last_access)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits,
            misses,
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ramp::synthesize;
    use crate::error::ValidationError;
    use crate::time::ManualClock;
    use chrono::TimeZone;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 21, 20, 0, 0).unwrap(),
        ))
    }

    fn key(kelvin: u32) -> RampKey {
        RampKey::new(kelvin, 1.0, 1.0, 7)
    }

    fn cache_with(capacity: usize, clock: &Arc<ManualClock>) -> GammaRampCache {
        GammaRampCache::new(capacity, Duration::from_secs(30 * 60), clock.clone())
    }

    #[test]
    fn test_single_synthesis_per_key() {
        let clock = clock();
        let cache = cache_with(200, &clock);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            synthesize(4000, 1.0, 1.0)
        };

        let first = cache.get_or_compute(key(4000), compute).unwrap();
        let second = cache
            .get_or_compute(key(4000), || {
                calls.fetch_add(1, Ordering::SeqCst);
                synthesize(4000, 1.0, 1.0)
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first, *second);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_ratio, 0.5);
    }

    #[test]
    fn test_concurrent_misses_synthesize_once() {
        let clock = clock();
        let cache = cache_with(200, &clock);
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    cache
                        .get_or_compute(key(3000), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            synthesize(3000, 1.0, 1.0)
                        })
                        .unwrap()
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let clock = clock();
        let cache = cache_with(200, &clock);
        for kelvin in 1000..1250 {
            cache
                .get_or_compute(key(kelvin), || synthesize(kelvin, 1.0, 1.0))
                .unwrap();
        }

        assert_eq!(cache.len(), 200);
        assert!((1000..1050).all(|k| !cache.contains(&key(k))));
        assert!((1050..1250).all(|k| cache.contains(&key(k))));
        assert_eq!(cache.stats().evictions, 50);
    }

    #[test]
    fn test_access_refreshes_lru_position() {
        let clock = clock();
        let cache = cache_with(3, &clock);
        for kelvin in [2000, 3000, 4000] {
            cache.get_or_compute(key(kelvin), || synthesize(kelvin, 1.0, 1.0)).unwrap();
        }
        let created = cache.last_access(&key(2000)).unwrap();

        // Touch the oldest, then overflow
        clock.advance(Duration::from_secs(5));
        cache.get_or_compute(key(2000), || synthesize(2000, 1.0, 1.0)).unwrap();
        assert_eq!(
            cache.last_access(&key(2000)),
            Some(created + chrono::Duration::seconds(5))
        );
        cache.get_or_compute(key(5000), || synthesize(5000, 1.0, 1.0)).unwrap();

        assert!(cache.contains(&key(2000)));
        assert!(!cache.contains(&key(3000)));
    }

    #[test]
    fn test_ttl_expiry_ignores_access() {
        let clock = clock();
        let cache = cache_with(200, &clock);
        cache.get_or_compute(key(2500), || synthesize(2500, 1.0, 1.0)).unwrap();

        clock.advance(Duration::from_secs(20 * 60));
        cache.get_or_compute(key(2500), || synthesize(2500, 1.0, 1.0)).unwrap();
        cache.get_or_compute(key(2600), || synthesize(2600, 1.0, 1.0)).unwrap();

        clock.advance(Duration::from_secs(11 * 60));
        let report = cache.sweep();
        assert_eq!(report, SweepReport { expired: 1, evicted: 0 });
        assert!(!cache.contains(&key(2500)));
        assert!(cache.contains(&key(2600)));
    }

    #[test]
    fn test_expired_entry_is_resynthesized_on_lookup() {
        let clock = clock();
        let cache = cache_with(200, &clock);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            synthesize(5000, 1.0, 1.0)
        };
        cache.get_or_compute(key(5000), compute).unwrap();
        clock.advance(Duration::from_secs(31 * 60));
        cache.get_or_compute(key(5000), compute).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let clock = clock();
        let cache = cache_with(200, &clock);
        let result = cache.get_or_compute(key(900), || synthesize(900, 1.0, 1.0));
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
        assert!(!cache.contains(&key(900)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_quantization() {
        assert_eq!(RampKey::new(4000, 0.8, 1.0, 1), RampKey::new(4000, 0.800_000_1, 1.0, 1));
        assert_ne!(RampKey::new(4000, 0.8, 1.0, 1), RampKey::new(4000, 0.81, 1.0, 1));
        assert_ne!(RampKey::new(4000, 0.8, 1.0, 1), RampKey::new(4000, 0.8, 1.0, 2));
    }
}
