//! Read-only snapshot of engine internals for monitoring front ends.

use serde::Serialize;

use crate::color::CacheStats;
use crate::core::transition::TransitionState;
use crate::display::PoolStats;

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub pool: PoolStats,
    pub cache: CacheStats,
    pub applied_kelvin: Option<u32>,
    pub transition: Option<TransitionState>,
    pub safe_mode: bool,
    pub safe_mode_reason: Option<String>,
    /// Automatic planning is paused by a manual override.
    pub held: bool,
    pub average_write_ms: f64,
    pub failed_write_attempts: u64,
    pub monitors: usize,
    pub profile: String,
}

impl Diagnostics {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    /// Human readable dump through the logger.
    pub fn log(&self) {
        log_block_start!("Engine diagnostics");
        match self.applied_kelvin {
            Some(kelvin) => log_indented!("Applied temperature: {kelvin}K"),
            None => log_indented!("Applied temperature: none yet"),
        }
        log_indented!("Profile: {}", self.profile);
        if let Some(transition) = &self.transition {
            log_indented!(
                "Transition: {}K -> {}K ({}, {:.0}%, {:?})",
                transition.from,
                transition.to,
                transition.reason,
                transition.progress * 100.0,
                transition.status
            );
        }
        log_indented!(
            "Cache: {}/{} entries, hit ratio {:.1}% ({} hits, {} misses, {} evicted, {} expired)",
            self.cache.entries,
            self.cache.capacity,
            self.cache.hit_ratio * 100.0,
            self.cache.hits,
            self.cache.misses,
            self.cache.evictions,
            self.cache.expirations
        );
        log_indented!(
            "Pool: {} active, {} idle, max {} ({} opened, {} closed, {} leaked)",
            self.pool.active,
            self.pool.idle,
            self.pool.max,
            self.pool.opened,
            self.pool.closed,
            self.pool.leaked
        );
        log_indented!(
            "Writes: {:.2}ms average over {} monitor(s), {} failed attempts",
            self.average_write_ms,
            self.monitors,
            self.failed_write_attempts
        );
        if self.held {
            log_indented!("Automatic adjustment held by manual override");
        }
        if let Some(reason) = &self.safe_mode_reason {
            log_indented!("SAFE MODE: {reason}");
        }
    }
}
