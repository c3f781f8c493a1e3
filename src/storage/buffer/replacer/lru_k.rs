use std::collections::{HashMap, VecDeque};

use crate::common::types::FrameId;

/// LRU-K page replacement policy.
///
/// Eviction picks the evictable frame with the largest backward k-distance
/// (current timestamp minus the k-th most recent access). Frames with fewer
/// than k recorded accesses have a distance of +infinity; ties among those
/// fall back to classic LRU on the least-recent access.
pub struct LruKReplacer {
    node_store: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    curr_size: usize,
    replacer_size: usize,
    k: usize,
}

struct LruKNode {
    /// Most recent k access timestamps, oldest first
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LruKNode {
    fn new(k: usize, timestamp: u64) -> Self {
        let mut history = VecDeque::with_capacity(k);
        history.push_back(timestamp);
        Self {
            history,
            is_evictable: false,
        }
    }

    fn access(&mut self, k: usize, timestamp: u64) {
        self.history.push_back(timestamp);
        if self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Backward k-distance at `now`; None stands in for +infinity
    fn backward_k_distance(&self, k: usize, now: u64) -> Option<u64> {
        if self.history.len() < k {
            None
        } else {
            Some(now - self.history.front().copied().unwrap_or(0))
        }
    }

    fn least_recent(&self) -> u64 {
        self.history.front().copied().unwrap_or(0)
    }
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            node_store: HashMap::with_capacity(num_frames),
            current_timestamp: 0,
            curr_size: 0,
            replacer_size: num_frames,
            k,
        }
    }

    /// Record an access to the given frame, creating its node on first use.
    /// A new node starts out non-evictable.
    pub fn record_access(&mut self, frame_id: FrameId) {
        assert!(frame_id < self.replacer_size, "frame id {} is invalid", frame_id);
        self.current_timestamp += 1;
        let ts = self.current_timestamp;
        match self.node_store.get_mut(&frame_id) {
            Some(node) => node.access(self.k, ts),
            None => {
                self.node_store.insert(frame_id, LruKNode::new(self.k, ts));
            }
        }
    }

    /// Toggle whether a frame may be chosen as an eviction victim
    pub fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) {
        if let Some(node) = self.node_store.get_mut(&frame_id) {
            if node.is_evictable != set_evictable {
                node.is_evictable = set_evictable;
                if set_evictable {
                    self.curr_size += 1;
                } else {
                    self.curr_size -= 1;
                }
            }
        }
    }

    /// Evict the frame with the largest backward k-distance, breaking ties
    /// by the least recent access. Returns None when nothing is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            return None;
        }
        let now = self.current_timestamp;
        let mut victim: Option<(FrameId, Option<u64>, u64)> = None;
        for (&frame_id, node) in &self.node_store {
            if !node.is_evictable {
                continue;
            }
            let dist = node.backward_k_distance(self.k, now);
            let least = node.least_recent();
            let better = match &victim {
                None => true,
                Some((_, best_dist, best_least)) => match (dist, best_dist) {
                    // +inf beats any finite distance
                    (None, Some(_)) => true,
                    (Some(_), None) => false,
                    // equal class: older least-recent access wins
                    (None, None) => least < *best_least,
                    (Some(d), Some(bd)) => d > *bd || (d == *bd && least < *best_least),
                },
            };
            if better {
                victim = Some((frame_id, dist, least));
            }
        }
        let (frame_id, _, _) = victim?;
        self.remove(frame_id);
        Some(frame_id)
    }

    /// Drop a frame's access history entirely. No-op if the frame is not
    /// tracked.
    pub fn remove(&mut self, frame_id: FrameId) {
        if let Some(node) = self.node_store.remove(&frame_id) {
            if node.is_evictable {
                self.curr_size -= 1;
            }
        }
    }

    /// Number of evictable frames
    pub fn size(&self) -> usize {
        self.curr_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evict_order_with_infinite_distance() {
        // k=2, three frames accessed 1,2,3,1,2: frame 2 (0-indexed) is the
        // only one with fewer than k samples, so it goes first.
        let mut replacer = LruKReplacer::new(3, 2);
        for frame in [0, 1, 2, 0, 1] {
            replacer.record_access(frame);
        }
        for frame in 0..3 {
            replacer.set_evictable(frame, true);
        }
        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_evict_largest_backward_k_distance() {
        let mut replacer = LruKReplacer::new(4, 2);
        // frame 0: ts 1, 2 -> distance = now - 1
        // frame 1: ts 3, 4 -> distance = now - 3
        replacer.record_access(0);
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.record_access(1);
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);
        assert_eq!(replacer.evict(), Some(0));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_infinity_ties_break_by_least_recent() {
        let mut replacer = LruKReplacer::new(3, 3);
        // All frames have < k accesses; the oldest recorded access loses.
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(0);
        for frame in 0..3 {
            replacer.set_evictable(frame, true);
        }
        assert_eq!(replacer.evict(), Some(0));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), Some(2));
    }

    #[test]
    fn test_non_evictable_frames_are_skipped() {
        let mut replacer = LruKReplacer::new(2, 2);
        replacer.record_access(0);
        replacer.record_access(1);
        replacer.set_evictable(0, true);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(0));
        // frame 1 was never marked evictable
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_record_access_preserves_evictability() {
        let mut replacer = LruKReplacer::new(2, 2);
        replacer.record_access(0);
        assert_eq!(replacer.size(), 0);
        // further accesses never make a non-evictable frame evictable
        replacer.record_access(0);
        replacer.record_access(0);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut replacer = LruKReplacer::new(2, 2);
        replacer.remove(1);
        replacer.record_access(0);
        replacer.set_evictable(0, true);
        replacer.remove(0);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }
}
