//! Pool of per-monitor device contexts.
//!
//! Opening a gamma control is far more expensive than writing through one,
//! so contexts are kept open and reused. Every handle is either active
//! (leased to a caller) or idle (queued for reuse), never both. Handles are
//! bound to the monitor they were opened for.
//!
//! The pool lock only guards bookkeeping; opening and closing OS contexts
//! happens outside it so one slow monitor does not stall the others.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::common::constants::{MAXIMUM_POOL_SIZE, MINIMUM_POOL_SIZE, POOL_HANDLES_PER_MONITOR};
use crate::display::{DisplayDevice, MonitorId, RawContext};
use crate::error::DisplayError;
use crate::time::Clock;

/// Default pool size for `monitors` outputs.
pub fn default_pool_size(monitors: usize) -> usize {
    (monitors * POOL_HANDLES_PER_MONITOR).clamp(MINIMUM_POOL_SIZE, MAXIMUM_POOL_SIZE)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    pub active: usize,
    pub idle: usize,
    pub max: usize,
    pub opened: u64,
    pub closed: u64,
    pub leaked: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSweepReport {
    pub expired_idle: usize,
    pub reclaimed_leaks: usize,
}

#[derive(Debug, Clone)]
struct Handle {
    id: u64,
    monitor: MonitorId,
    raw: RawContext,
    // Last acquire or release
    since: DateTime<Utc>,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<Handle>,
    active: HashMap<u64, Handle>,
    // Slots reserved while a context is being opened outside the lock
    opening: usize,
    next_id: u64,
    closed: bool,
}

impl PoolState {
    fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.opening
    }
}

pub struct DeviceContextPool {
    device: Arc<dyn DisplayDevice>,
    clock: Arc<dyn Clock>,
    max: usize,
    handle_timeout: ChronoDuration,
    acquire_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
    opened: AtomicU64,
    closed: AtomicU64,
    leaked: AtomicU64,
}

impl DeviceContextPool {
    pub fn new(
        device: Arc<dyn DisplayDevice>,
        clock: Arc<dyn Clock>,
        max: usize,
        handle_timeout: Duration,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            device,
            clock,
            max: max.clamp(1, MAXIMUM_POOL_SIZE),
            handle_timeout: ChronoDuration::from_std(handle_timeout)
                .unwrap_or(ChronoDuration::MAX),
            acquire_timeout,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            leaked: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn expired(&self, handle: &Handle, now: DateTime<Utc>) -> bool {
        now - handle.since >= self.handle_timeout
    }

    fn close(&self, handle: Handle) {
        self.device.close_context(handle.raw);
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Lease a context for `monitor`.
    ///
    /// Reuses an idle context of that monitor, otherwise opens a new one while
    /// under the maximum. At the maximum an idle context of another monitor is
    /// closed to make room; failing that the call waits up to the acquire
    /// timeout and then fails with `PoolExhausted`.
    pub fn acquire(&self, monitor: MonitorId) -> Result<ContextLease<'_>, DisplayError> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(DisplayError::PoolClosed);
            }
            let now = self.clock.now();

            // Stale idle handles are closed rather than handed out
            let mut stale = Vec::new();
            state.idle.retain(|h| {
                if self.expired(h, now) {
                    stale.push(h.clone());
                    false
                } else {
                    true
                }
            });
            if !stale.is_empty() {
                drop(state);
                for handle in stale {
                    self.close(handle);
                }
                state = self.lock();
                continue;
            }

            if let Some(pos) = state.idle.iter().position(|h| h.monitor == monitor)
                && let Some(mut handle) = state.idle.remove(pos)
            {
                handle.since = now;
                state.active.insert(handle.id, handle.clone());
                return Ok(ContextLease::new(self, handle));
            }

            if state.total() < self.max {
                state.opening += 1;
                drop(state);
                let opened = self.device.open_context(monitor);
                state = self.lock();
                state.opening -= 1;

                let raw = match opened {
                    Ok(raw) => raw,
                    Err(error) => {
                        self.available.notify_one();
                        return Err(error);
                    }
                };
                self.opened.fetch_add(1, Ordering::Relaxed);
                if state.closed {
                    drop(state);
                    self.device.close_context(raw);
                    self.closed.fetch_add(1, Ordering::Relaxed);
                    return Err(DisplayError::PoolClosed);
                }
                let handle = Handle {
                    id: state.next_id,
                    monitor,
                    raw,
                    since: self.clock.now(),
                };
                state.next_id += 1;
                state.active.insert(handle.id, handle.clone());
                return Ok(ContextLease::new(self, handle));
            }

            // Full: free a slot held idle by another monitor
            if let Some(pos) = state.idle.iter().position(|h| h.monitor != monitor)
                && let Some(victim) = state.idle.remove(pos)
            {
                drop(state);
                self.close(victim);
                state = self.lock();
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DisplayError::PoolExhausted {
                    waited_ms: self.acquire_timeout.as_millis() as u64,
                    max: self.max,
                });
            }
            state = self
                .available
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Return a leased context to the idle queue.
    pub fn release(&self, lease: ContextLease<'_>) {
        drop(lease);
    }

    fn give_back(&self, id: u64, discard: bool) {
        let mut state = self.lock();
        let Some(mut handle) = state.active.remove(&id) else {
            log_debug!("Device context #{id} was already reclaimed");
            return;
        };

        if discard || state.closed {
            drop(state);
            self.close(handle);
        } else {
            handle.since = self.clock.now();
            state.idle.push_back(handle);
            drop(state);
        }
        self.available.notify_one();
    }

    /// Close idle handles past the timeout and reclaim leaked active ones.
    ///
    /// An active handle past the timeout means a caller never released it.
    /// It is removed from the active set, closed, and reported as a leak.
    pub fn sweep(&self) -> PoolSweepReport {
        let now = self.clock.now();
        let mut state = self.lock();

        let mut expired_idle = Vec::new();
        state.idle.retain(|h| {
            if self.expired(h, now) {
                expired_idle.push(h.clone());
                false
            } else {
                true
            }
        });

        let leaked_ids: Vec<u64> = state
            .active
            .values()
            .filter(|h| self.expired(h, now))
            .map(|h| h.id)
            .collect();
        let leaked: Vec<Handle> = leaked_ids
            .iter()
            .filter_map(|id| state.active.remove(id))
            .collect();
        drop(state);

        let report = PoolSweepReport {
            expired_idle: expired_idle.len(),
            reclaimed_leaks: leaked.len(),
        };

        for handle in expired_idle {
            self.close(handle);
        }
        for handle in leaked {
            log_warning!(
                "Reclaimed leaked device context #{} on monitor {} (held {}s)",
                handle.id,
                handle.monitor,
                (now - handle.since).num_seconds()
            );
            self.leaked.fetch_add(1, Ordering::Relaxed);
            self.close(handle);
        }

        if report.expired_idle + report.reclaimed_leaks > 0 {
            self.available.notify_all();
            log_debug!(
                "Context pool sweep: {} idle closed, {} leaks reclaimed",
                report.expired_idle,
                report.reclaimed_leaks
            );
        }
        report
    }

    /// Close every handle and refuse further acquires. Safe to call twice.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.closed = true;
        let mut handles: Vec<Handle> = state.idle.drain(..).collect();
        handles.extend(state.active.drain().map(|(_, h)| h));
        drop(state);

        for handle in handles {
            self.close(handle);
        }
        self.available.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            active: state.active.len(),
            idle: state.idle.len(),
            max: self.max,
            opened: self.opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            leaked: self.leaked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DeviceContextPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A leased device context. Returns to the pool when dropped.
pub struct ContextLease<'a> {
    pool: &'a DeviceContextPool,
    handle: Option<Handle>,
}

impl<'a> ContextLease<'a> {
    fn new(pool: &'a DeviceContextPool, handle: Handle) -> Self {
        Self {
            pool,
            handle: Some(handle),
        }
    }

    pub fn raw(&self) -> RawContext {
        self.handle.as_ref().map_or(RawContext(0), |h| h.raw)
    }

    pub fn monitor(&self) -> MonitorId {
        self.handle.as_ref().map_or(MonitorId(0), |h| h.monitor)
    }

    /// Close the context instead of returning it, e.g. after a failed write.
    pub fn discard(mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.give_back(handle.id, true);
        }
    }
}

impl Drop for ContextLease<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.give_back(handle.id, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::SimulatedDisplay;
    use crate::time::ManualClock;
    use chrono::TimeZone;

    struct Fixture {
        clock: Arc<ManualClock>,
        display: Arc<SimulatedDisplay>,
        pool: DeviceContextPool,
    }

    fn fixture(monitors: u32, max: usize) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 21, 21, 0, 0).unwrap(),
        ));
        let display = Arc::new(SimulatedDisplay::new(monitors, clock.clone()));
        let pool = DeviceContextPool::new(
            display.clone(),
            clock.clone(),
            max,
            Duration::from_secs(300),
            Duration::from_millis(30),
        );
        Fixture {
            clock,
            display,
            pool,
        }
    }

    #[test]
    fn test_default_pool_size() {
        assert_eq!(default_pool_size(0), 2);
        assert_eq!(default_pool_size(1), 2);
        assert_eq!(default_pool_size(3), 6);
        assert_eq!(default_pool_size(8), 10);
    }

    #[test]
    fn test_release_makes_handle_reusable() {
        let f = fixture(1, 2);
        let lease = f.pool.acquire(MonitorId(0)).unwrap();
        let raw = lease.raw();
        f.pool.release(lease);

        let stats = f.pool.stats();
        assert_eq!((stats.active, stats.idle), (0, 1));

        let again = f.pool.acquire(MonitorId(0)).unwrap();
        assert_eq!(again.raw(), raw);
        assert_eq!(f.display.opened(), 1);
    }

    #[test]
    fn test_exhaustion_fails_in_bounded_time() {
        let f = fixture(1, 2);
        let _a = f.pool.acquire(MonitorId(0)).unwrap();
        let _b = f.pool.acquire(MonitorId(0)).unwrap();

        let started = Instant::now();
        let result = f.pool.acquire(MonitorId(0));
        assert!(matches!(result, Err(DisplayError::PoolExhausted { max: 2, .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(f.display.open_contexts(), 2);
    }

    #[test]
    fn test_waiter_gets_released_handle() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 21, 21, 0, 0).unwrap(),
        ));
        let display = Arc::new(SimulatedDisplay::new(1, clock.clone()));
        let pool = DeviceContextPool::new(
            display,
            clock,
            1,
            Duration::from_secs(300),
            Duration::from_secs(5),
        );

        let lease = pool.acquire(MonitorId(0)).unwrap();
        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| pool.acquire(MonitorId(0)).map(|l| l.raw()));
            std::thread::sleep(Duration::from_millis(20));
            let raw = lease.raw();
            pool.release(lease);
            assert_eq!(waiter.join().unwrap(), Ok(raw));
        });
    }

    #[test]
    fn test_full_pool_evicts_other_monitors_idle_handle() {
        let f = fixture(2, 2);
        let a = f.pool.acquire(MonitorId(0)).unwrap();
        let b = f.pool.acquire(MonitorId(0)).unwrap();
        drop(a);
        drop(b);

        let lease = f.pool.acquire(MonitorId(1)).unwrap();
        assert_eq!(lease.monitor(), MonitorId(1));
        assert_eq!(f.display.closed(), 1);
        assert!(f.pool.stats().active + f.pool.stats().idle <= 2);
    }

    #[test]
    fn test_sweep_closes_expired_idle_handles() {
        let f = fixture(1, 2);
        drop(f.pool.acquire(MonitorId(0)).unwrap());
        f.clock.advance(Duration::from_secs(301));

        let report = f.pool.sweep();
        assert_eq!(report.expired_idle, 1);
        assert_eq!(f.pool.stats().idle, 0);
        assert_eq!(f.display.open_contexts(), 0);
    }

    #[test]
    fn test_sweep_reclaims_leaked_active_handles() {
        let f = fixture(1, 2);
        let lease = f.pool.acquire(MonitorId(0)).unwrap();
        std::mem::forget(lease);
        assert_eq!(f.pool.stats().active, 1);

        f.clock.advance(Duration::from_secs(299));
        assert_eq!(f.pool.sweep().reclaimed_leaks, 0);

        f.clock.advance(Duration::from_secs(2));
        let report = f.pool.sweep();
        assert_eq!(report.reclaimed_leaks, 1);
        let stats = f.pool.stats();
        assert_eq!((stats.active, stats.leaked), (0, 1));
        assert_eq!(f.display.open_contexts(), 0);
    }

    #[test]
    fn test_release_after_reclaim_is_ignored() {
        let f = fixture(1, 2);
        let lease = f.pool.acquire(MonitorId(0)).unwrap();
        f.clock.advance(Duration::from_secs(301));
        f.pool.sweep();
        drop(lease);
        let stats = f.pool.stats();
        assert_eq!((stats.active, stats.idle), (0, 0));
    }

    #[test]
    fn test_discard_closes_context() {
        let f = fixture(1, 2);
        let lease = f.pool.acquire(MonitorId(0)).unwrap();
        lease.discard();
        assert_eq!(f.pool.stats().idle, 0);
        assert_eq!(f.display.closed(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let f = fixture(2, 4);
        let lease = f.pool.acquire(MonitorId(0)).unwrap();
        drop(f.pool.acquire(MonitorId(1)).unwrap());

        f.pool.shutdown();
        f.pool.shutdown();
        assert_eq!(f.display.open_contexts(), 0);
        assert!(matches!(
            f.pool.acquire(MonitorId(0)),
            Err(DisplayError::PoolClosed)
        ));
        drop(lease);
        assert_eq!(f.display.closed(), 2);
    }

    #[test]
    fn test_open_failure_frees_slot() {
        let f = fixture(1, 1);
        f.display.fail_next_opens(1);
        assert!(f.pool.acquire(MonitorId(0)).is_err());
        assert!(f.pool.acquire(MonitorId(0)).is_ok());
    }
}
