// ============================================================================
// RENDER TARGET POOL — recycle mask targets by (width, height, resolution)
// ============================================================================

use std::collections::{HashMap, VecDeque};

use super::target::RenderTarget;
use crate::log_debug;

/// Key for pooled targets: (css width, css height, resolution bits).
type PoolKey = (u32, u32, u32);

fn key_of(width: u32, height: u32, resolution: f32) -> PoolKey {
    (width, height, resolution.to_bits())
}

/// Allocation counters.  `outstanding` is the number of targets acquired
/// and not yet released; it returns to zero once every owner has released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated: u64,
    pub reused: u64,
    pub destroyed: u64,
    pub outstanding: u64,
}

/// Free lists of render targets keyed by exact size class.
///
/// Every `acquire` must be matched by a `release`.  Released targets are
/// kept oldest-first; once a key holds more than `max_per_key` targets the
/// oldest is dropped.
pub struct RenderTargetPool {
    pool: HashMap<PoolKey, VecDeque<RenderTarget>>,
    max_per_key: usize,
    next_id: u64,
    stats: PoolStats,
}

impl RenderTargetPool {
    pub fn new(max_per_key: usize) -> Self {
        Self {
            pool: HashMap::new(),
            max_per_key: max_per_key.max(1),
            next_id: 1,
            stats: PoolStats::default(),
        }
    }

    /// A cleared target of exactly this size: the most recently released
    /// one for the key, or a new allocation.
    pub fn acquire(&mut self, width: u32, height: u32, resolution: f32) -> RenderTarget {
        self.stats.outstanding += 1;
        if let Some(mut rt) = self.pool.get_mut(&key_of(width, height, resolution)).and_then(|q| q.pop_back()) {
            self.stats.reused += 1;
            rt.clear();
            return rt;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.stats.allocated += 1;
        RenderTarget::new(id, width, height, resolution)
    }

    pub fn release(&mut self, rt: RenderTarget) {
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        let key = key_of(rt.width, rt.height, rt.resolution);
        let queue = self.pool.entry(key).or_default();
        queue.push_back(rt);
        while queue.len() > self.max_per_key {
            if let Some(old) = queue.pop_front() {
                self.stats.destroyed += 1;
                log_debug!("rt pool: evicted target {} ({}x{} @{})", old.id, key.0, key.1, old.resolution);
            }
        }
    }

    /// Drop every pooled target (outstanding ones are unaffected).
    pub fn drain(&mut self) {
        let n = self.pooled_count() as u64;
        self.stats.destroyed += n;
        self.pool.clear();
    }

    pub fn pooled_count(&self) -> usize {
        self.pool.values().map(VecDeque::len).sum()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl Default for RenderTargetPool {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_targets_are_reused_and_cleared() {
        let mut pool = RenderTargetPool::new(4);
        let mut rt = pool.acquire(10, 10, 2.0);
        let id = rt.id;
        rt.pixels.put_pixel(3, 3, image::Luma([255]));
        pool.release(rt);

        let again = pool.acquire(10, 10, 2.0);
        assert_eq!(again.id, id);
        assert_eq!(again.alpha(3, 3), 0);
        assert_eq!(again.pixel_width(), 20);
        assert_eq!(pool.stats().reused, 1);

        let other = pool.acquire(10, 10, 1.0);
        assert_ne!(other.id, id);
        pool.release(again);
        pool.release(other);
        assert_eq!(pool.stats().outstanding, 0);
    }

    #[test]
    fn oldest_is_evicted_past_the_cap() {
        let mut pool = RenderTargetPool::new(2);
        let targets: Vec<_> = (0..3).map(|_| pool.acquire(4, 4, 1.0)).collect();
        let first = targets[0].id;
        for rt in targets {
            pool.release(rt);
        }
        assert_eq!(pool.pooled_count(), 2);
        assert_eq!(pool.stats().destroyed, 1);
        // Remaining targets never include the evicted one.
        let a = pool.acquire(4, 4, 1.0);
        let b = pool.acquire(4, 4, 1.0);
        assert!(a.id != first && b.id != first);
    }
}
