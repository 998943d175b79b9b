use crate::buffer::buffer_pool_manager::{BufferPoolManager, BufferPoolManagerInstance};
use crate::buffer::replacer::LruReplacer;
use crate::storage::disk::disk_manager::{DiskManager, FakeDiskManager};
use crate::storage::page::page::{Page, PageId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Stripes page ownership over `num_instances` independent pool instances:
/// page `p` belongs to instance `p % num_instances`. Instances share one disk
/// handle and are created on first touch.
pub struct ParallelBufferPoolManager<D: DiskManager> {
    num_instances: usize,
    pool_size: usize,
    start_instance: AtomicUsize,
    disk_manager: Arc<Mutex<D>>,
    instances: Vec<OnceLock<BufferPoolManagerInstance<LruReplacer, D>>>,
}

impl<D: DiskManager> ParallelBufferPoolManager<D> {
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<Mutex<D>>,
    ) -> ParallelBufferPoolManager<D> {
        assert!(num_instances > 0, "pool must have at least one instance");

        ParallelBufferPoolManager {
            num_instances,
            pool_size,
            start_instance: AtomicUsize::new(0),
            disk_manager,
            instances: (0..num_instances).map(|_| OnceLock::new()).collect(),
        }
    }

    fn instance(&self, index: usize) -> &BufferPoolManagerInstance<LruReplacer, D> {
        self.instances[index].get_or_init(|| {
            BufferPoolManagerInstance::new(
                self.pool_size,
                self.num_instances,
                index,
                LruReplacer::new(self.pool_size),
                self.disk_manager.clone(),
            )
        })
    }

    fn instance_for_page(&self, page_id: PageId) -> &BufferPoolManagerInstance<LruReplacer, D> {
        self.instance(page_id as usize % self.num_instances)
    }
}

impl ParallelBufferPoolManager<FakeDiskManager> {
    pub fn new_default(num_instances: usize, pool_size: usize) -> Self {
        ParallelBufferPoolManager::new(
            num_instances,
            pool_size,
            Arc::new(Mutex::new(FakeDiskManager::new())),
        )
    }
}

impl<D: DiskManager + Send> BufferPoolManager for ParallelBufferPoolManager<D> {
    /// Round-robins over the instances, starting one further along on every
    /// call so allocation load spreads; the first instance with a free or
    /// evictable frame wins.
    fn new_page(&self) -> Option<Arc<RwLock<Page>>> {
        let start = self.start_instance.fetch_add(1, Ordering::Relaxed);

        for i in 0..self.num_instances {
            let page = self.instance((start + i) % self.num_instances).new_page();
            if page.is_some() {
                return page;
            }
        }
        None
    }

    fn fetch_page(&self, page_id: PageId) -> Option<Arc<RwLock<Page>>> {
        self.instance_for_page(page_id).fetch_page(page_id)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.instance_for_page(page_id).unpin_page(page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> bool {
        self.instance_for_page(page_id).flush_page(page_id)
    }

    fn flush_all_pages(&self) {
        for slot in &self.instances {
            if let Some(instance) = slot.get() {
                instance.flush_all_pages();
            }
        }
    }

    fn delete_page(&self, page_id: PageId) -> bool {
        self.instance_for_page(page_id).delete_page(page_id)
    }

    fn get_pool_size(&self) -> usize {
        self.num_instances * self.pool_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_total_capacity_over_all_instances() {
        let bpm = ParallelBufferPoolManager::new_default(4, 3);
        assert_eq!(bpm.get_pool_size(), 12);
    }

    #[test]
    fn should_spread_new_pages_round_robin_over_instances() {
        // given: two instances, each handing out ids of its own stripe
        let bpm = ParallelBufferPoolManager::new_default(2, 2);

        // when
        let mut ids = vec![];
        for _ in 0..4 {
            ids.push(bpm.new_page().unwrap().read().unwrap().get_id());
        }

        // then: the cursor alternates the starting instance
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id as usize % 2, i % 2);
        }
    }

    #[test]
    fn should_fall_over_to_next_instance_when_one_is_full() {
        let bpm = ParallelBufferPoolManager::new_default(2, 1);

        let pid1 = bpm.new_page().unwrap().read().unwrap().get_id();
        let pid2 = bpm.new_page().unwrap().read().unwrap().get_id();
        assert_ne!(pid1 as usize % 2, pid2 as usize % 2);

        // both single-frame instances hold a pinned page now
        assert!(bpm.new_page().is_none());

        bpm.unpin_page(pid1, false);
        assert!(bpm.new_page().is_some());
    }

    #[test]
    fn should_route_page_calls_to_owning_instance() {
        // given
        let bpm = ParallelBufferPoolManager::new_default(3, 2);
        let page = bpm.new_page().unwrap();
        let pid = page.read().unwrap().get_id();
        page.write().unwrap().get_data_mut()[0..3].copy_from_slice(b"abc");

        // when: unpin dirty, force the owner to cycle the frame, fetch back
        assert!(bpm.unpin_page(pid, true));
        assert!(bpm.flush_page(pid));
        let fetched = bpm.fetch_page(pid).unwrap();

        // then
        assert_eq!(&fetched.read().unwrap().get_data()[0..3], b"abc");
        assert!(bpm.unpin_page(pid, false));
        assert!(bpm.delete_page(pid));
    }

    #[test]
    fn should_flush_all_pages_across_instances() {
        let bpm = ParallelBufferPoolManager::new_default(2, 2);

        let mut pids = vec![];
        for _ in 0..4 {
            let page = bpm.new_page().unwrap();
            let pid = page.read().unwrap().get_id();
            page.write().unwrap().get_data_mut()[0] = pid as u8;
            pids.push(pid);
            bpm.unpin_page(pid, true);
        }

        bpm.flush_all_pages();

        for pid in pids {
            let page = bpm.fetch_page(pid).unwrap();
            assert!(!page.read().unwrap().is_dirty());
            assert_eq!(page.read().unwrap().get_data()[0], pid as u8);
            bpm.unpin_page(pid, false);
        }
    }
}
