// ============================================================================
// FRAME SCHEDULER — "at most once on the next frame" coalesced tasks
// ============================================================================
//
// Nothing here runs on its own: the engine drains due tasks at the top of
// each frame.  Scheduling a key that is already pending only replaces its
// arguments, so a burst of requests within one frame becomes one run.

use std::fmt::Debug;

/// Pending tasks keyed by `K`, each carrying the latest arguments `A`.
#[derive(Debug)]
pub struct FrameScheduler<K, A> {
    pending: Vec<(K, A)>,
    coalesced: u64,
}

impl<K: PartialEq + Debug, A> Default for FrameScheduler<K, A> {
    fn default() -> Self {
        Self { pending: Vec::new(), coalesced: 0 }
    }
}

impl<K: PartialEq + Debug, A> FrameScheduler<K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `key` for the next frame, replacing the arguments of an
    /// already pending run.
    pub fn schedule(&mut self, key: K, args: A) {
        match self.pending.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                slot.1 = args;
                self.coalesced += 1;
            }
            None => self.pending.push((key, args)),
        }
    }

    /// Drop a pending run.  Returns its arguments if there was one.
    pub fn cancel(&mut self, key: &K) -> Option<A> {
        let idx = self.pending.iter().position(|(k, _)| k == key)?;
        Some(self.pending.remove(idx).1)
    }

    /// Drop every pending run matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&K) -> bool) {
        self.pending.retain(|(k, _)| !pred(k));
    }

    /// Take a pending run out of the queue so the caller can execute it
    /// right now instead of next frame.
    pub fn flush(&mut self, key: &K) -> Option<A> {
        self.cancel(key)
    }

    /// Everything due this frame, in scheduling order.  Tasks scheduled
    /// while the result is being processed wait for the following frame.
    pub fn drain_due(&mut self) -> Vec<(K, A)> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Requests that were folded into an already pending run.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced
    }
}

/// Keys for mask refresh tasks.  `All` covers every region.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefreshKey {
    All,
    Region(String),
}

/// Why a refresh was queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshReason {
    Requested,
    /// An earlier build failed.
    Retry,
}

/// Refresh queue with `All` subsuming per-region keys.
#[derive(Debug, Default)]
pub struct RefreshQueue {
    inner: FrameScheduler<RefreshKey, RefreshReason>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_region(&mut self, region_id: &str, reason: RefreshReason) {
        if self.inner.is_pending(&RefreshKey::All) {
            return;
        }
        self.inner.schedule(RefreshKey::Region(region_id.to_string()), reason);
    }

    pub fn request_all(&mut self, reason: RefreshReason) {
        self.inner.cancel_where(|k| matches!(k, RefreshKey::Region(_)));
        self.inner.schedule(RefreshKey::All, reason);
    }

    pub fn cancel_region(&mut self, region_id: &str) -> bool {
        self.inner.cancel(&RefreshKey::Region(region_id.to_string())).is_some()
    }

    pub fn flush(&mut self, key: &RefreshKey) -> Option<RefreshReason> {
        self.inner.flush(key)
    }

    pub fn drain_due(&mut self) -> Vec<(RefreshKey, RefreshReason)> {
        self.inner.drain_due()
    }

    pub fn is_pending(&self, key: &RefreshKey) -> bool {
        self.inner.is_pending(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn coalesced_count(&self) -> u64 {
        self.inner.coalesced_count()
    }
}

/// Waits for the view to stop changing after a draw.  Fires once the same
/// key has been observed on three consecutive frames.
#[derive(Debug)]
pub struct StableViewWatcher<K> {
    armed: bool,
    last: Option<K>,
    repeats: u32,
}

impl<K> Default for StableViewWatcher<K> {
    fn default() -> Self {
        Self { armed: false, last: None, repeats: 0 }
    }
}

impl<K: PartialEq> StableViewWatcher<K> {
    const REQUIRED_REPEATS: u32 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) waiting.
    pub fn arm(&mut self) {
        self.armed = true;
        self.last = None;
        self.repeats = 0;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
        self.last = None;
        self.repeats = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Feed this frame's key.  Returns true exactly once, when the view has
    /// been stable long enough; the watcher disarms itself.
    pub fn observe(&mut self, key: K) -> bool {
        if !self.armed {
            return false;
        }
        if self.last.as_ref() == Some(&key) {
            self.repeats += 1;
        } else {
            self.repeats = 0;
            self.last = Some(key);
        }
        if self.repeats >= Self::REQUIRED_REPEATS {
            self.cancel();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_requests_coalesce_to_latest_args() {
        let mut s: FrameScheduler<&str, u32> = FrameScheduler::new();
        s.schedule("a", 1);
        s.schedule("b", 2);
        s.schedule("a", 3);
        assert_eq!(s.coalesced_count(), 1);
        assert_eq!(s.drain_due(), vec![("a", 3), ("b", 2)]);
        assert!(s.is_empty());
    }

    #[test]
    fn cancel_and_flush() {
        let mut s: FrameScheduler<&str, u32> = FrameScheduler::new();
        s.schedule("a", 1);
        s.schedule("b", 2);
        assert_eq!(s.cancel(&"a"), Some(1));
        assert_eq!(s.cancel(&"a"), None);
        assert_eq!(s.flush(&"b"), Some(2));
        assert!(s.drain_due().is_empty());
    }

    #[test]
    fn all_subsumes_region_requests() {
        let mut q = RefreshQueue::new();
        q.request_region("r1", RefreshReason::Requested);
        q.request_region("r2", RefreshReason::Retry);
        q.request_all(RefreshReason::Requested);
        q.request_region("r3", RefreshReason::Requested);
        assert_eq!(q.drain_due(), vec![(RefreshKey::All, RefreshReason::Requested)]);
    }

    #[test]
    fn stable_view_fires_on_third_identical_frame() {
        let mut w = StableViewWatcher::new();
        assert!(!w.observe(1));
        w.arm();
        assert!(!w.observe(1));
        assert!(!w.observe(2));
        assert!(!w.observe(2));
        assert!(w.observe(2));
        assert!(!w.is_armed());
        assert!(!w.observe(2));
    }
}
