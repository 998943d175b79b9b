use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

pub trait Replacer: Send + Sync {
    fn victim(&self) -> Option<usize>;

    fn pin(&self, frame_id: usize);

    fn unpin(&self, frame_id: usize);

    fn size(&self) -> usize;
}

struct LruState {
    // least recently unpinned frame at the front
    queue: VecDeque<usize>,
    pinned: HashSet<usize>,
}

pub struct LruReplacer {
    frame_holder: Mutex<LruState>,
}

impl LruReplacer {
    /// All frames start out pinned: an empty frame lives in the pool's free
    /// list, not in the eviction queue.
    pub fn new(size: usize) -> LruReplacer {
        LruReplacer {
            frame_holder: Mutex::new(LruState {
                queue: VecDeque::with_capacity(size),
                pinned: (0..size).collect(),
            }),
        }
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<usize> {
        let mut guard = self.frame_holder.lock().unwrap();
        let frame_id = guard.queue.pop_front()?;
        guard.pinned.insert(frame_id);
        Some(frame_id)
    }

    fn pin(&self, frame_id: usize) {
        let mut guard = self.frame_holder.lock().unwrap();
        if guard.pinned.insert(frame_id) {
            if let Some(pos) = guard.queue.iter().position(|&f| f == frame_id) {
                guard.queue.remove(pos);
            }
        }
    }

    fn unpin(&self, frame_id: usize) {
        let mut guard = self.frame_holder.lock().unwrap();
        if guard.pinned.remove(&frame_id) {
            guard.queue.push_back(frame_id);
        }
    }

    fn size(&self) -> usize {
        self.frame_holder.lock().unwrap().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::replacer::{LruReplacer, Replacer};

    #[test]
    fn test_lru_replacer() {
        let replacer = LruReplacer::new(7);

        // Scenario: everything starts pinned, nothing to evict.
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.victim(), None);

        // Scenario: unpin six elements, i.e. add them to the replacer.
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        replacer.unpin(4);
        replacer.unpin(5);
        replacer.unpin(6);
        // a second unpin must not refresh the recency of 1
        replacer.unpin(1);

        assert_eq!(replacer.size(), 6);

        // Scenario: victims come back in the order of their unpins.
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));

        // Scenario: pin elements in the replacer.
        // Note that 3 has already been victimized, so pinning 3 should have no effect.
        replacer.pin(3);
        replacer.pin(4);
        assert_eq!(replacer.size(), 2);

        // Scenario: unpin 4. 4 becomes the most recently unpinned frame.
        replacer.unpin(4);

        // Scenario: continue looking for victims. We expect these victims.
        assert_eq!(replacer.victim(), Some(5));
        assert_eq!(replacer.victim(), Some(6));
        assert_eq!(replacer.victim(), Some(4));
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn should_keep_victim_order_across_interleaved_pins() {
        let replacer = LruReplacer::new(5);

        replacer.unpin(0);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        replacer.unpin(3);
        replacer.unpin(1);

        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.victim(), Some(0));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), Some(1));
    }
}
