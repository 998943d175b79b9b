use crate::buffer::replacer::{LruReplacer, Replacer};
use crate::storage::disk::disk_manager::{DiskManager, FakeDiskManager};
use crate::storage::page::page::{Page, PageId, INVALID_PAGE_ID};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

pub type FrameId = usize;

/// Shared handle every pool flavor exposes. A fetched or newly created page
/// comes back as the frame's `Arc<RwLock<Page>>`: the lock is the page latch,
/// callers take read/write guards themselves and must drop the guard before
/// unpinning.
pub trait BufferPoolManager: Send + Sync {
    fn new_page(&self) -> Option<Arc<RwLock<Page>>>;

    fn fetch_page(&self, page_id: PageId) -> Option<Arc<RwLock<Page>>>;

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool;

    fn flush_page(&self, page_id: PageId) -> bool;

    fn flush_all_pages(&self);

    fn delete_page(&self, page_id: PageId) -> bool;

    fn get_pool_size(&self) -> usize;
}

struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
}

pub struct BufferPoolManagerInstance<R: Replacer, D: DiskManager> {
    pool_size: usize,
    num_instances: usize,
    instance_index: usize,
    pool: Vec<Arc<RwLock<Page>>>,
    replacer: R,
    latch: Mutex<PoolInner>,
    disk_manager: Arc<Mutex<D>>,
}

impl<R: Replacer, D: DiskManager> BufferPoolManagerInstance<R, D> {
    pub fn new(
        pool_size: usize,
        num_instances: usize,
        instance_index: usize,
        replacer: R,
        disk_manager: Arc<Mutex<D>>,
    ) -> BufferPoolManagerInstance<R, D> {
        assert!(num_instances > 0, "pool must have at least one instance");
        assert!(
            instance_index < num_instances,
            "instance index out of range"
        );

        BufferPoolManagerInstance {
            pool_size,
            num_instances,
            instance_index,
            pool: (0..pool_size)
                .map(|_| Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID))))
                .collect(),
            replacer,
            latch: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list: (0..pool_size).collect(),
                next_page_id: instance_index as PageId,
            }),
            disk_manager,
        }
    }

    /// Every id handed out satisfies `id % num_instances == instance_index`,
    /// so a striped pool can route any page back to its owner.
    fn allocate_page(&self, inner: &mut PoolInner) -> PageId {
        let page_id = inner.next_page_id;
        inner.next_page_id += self.num_instances as PageId;
        debug_assert_eq!(page_id as usize % self.num_instances, self.instance_index);
        page_id
    }

    // Free frames first; only a miss on the free list asks the replacer.
    fn find_frame(&self, inner: &mut PoolInner) -> Option<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Some(frame_id);
        }
        self.replacer.victim()
    }

    // The victim frame has pin count zero, so taking its write latch here
    // cannot block on any caller.
    fn evict(&self, inner: &mut PoolInner, frame_id: FrameId, page: &mut Page) {
        if page.is_dirty() {
            debug!(
                "evicting dirty page {} from frame {}, writing back",
                page.get_id(),
                frame_id
            );
            self.disk_manager
                .lock()
                .unwrap()
                .write_page(page.get_id(), page.get_data())
                .expect("disk write failed");
        }
        inner.page_table.remove(&page.get_id());
    }
}

impl<D: DiskManager> BufferPoolManagerInstance<LruReplacer, D> {
    pub fn new_single(pool_size: usize, disk_manager: Arc<Mutex<D>>) -> Self {
        BufferPoolManagerInstance::new(pool_size, 1, 0, LruReplacer::new(pool_size), disk_manager)
    }
}

impl BufferPoolManagerInstance<LruReplacer, FakeDiskManager> {
    pub fn new_default(pool_size: usize) -> Self {
        Self::new_single(pool_size, Arc::new(Mutex::new(FakeDiskManager::new())))
    }
}

impl<R: Replacer, D: DiskManager + Send> BufferPoolManager for BufferPoolManagerInstance<R, D> {
    fn new_page(&self) -> Option<Arc<RwLock<Page>>> {
        let mut inner = self.latch.lock().unwrap();

        let frame_id = self.find_frame(&mut inner)?;
        self.replacer.pin(frame_id);

        let page_arc = self.pool[frame_id].clone();
        {
            let mut page = page_arc.write().unwrap();
            self.evict(&mut inner, frame_id, &mut page);

            let page_id = self.allocate_page(&mut inner);
            inner.page_table.insert(page_id, frame_id);
            page.reset_memory();
            page.set_id(page_id);
            page.set_pin_count(1);
            page.set_dirty(false);
        }

        Some(page_arc)
    }

    fn fetch_page(&self, page_id: PageId) -> Option<Arc<RwLock<Page>>> {
        let mut inner = self.latch.lock().unwrap();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let page_arc = self.pool[frame_id].clone();
            page_arc.write().unwrap().pin();
            self.replacer.pin(frame_id);
            return Some(page_arc);
        }

        let frame_id = self.find_frame(&mut inner)?;
        self.replacer.pin(frame_id);

        let page_arc = self.pool[frame_id].clone();
        {
            let mut page = page_arc.write().unwrap();
            self.evict(&mut inner, frame_id, &mut page);

            inner.page_table.insert(page_id, frame_id);
            self.disk_manager
                .lock()
                .unwrap()
                .read_page(page_id, page.get_data_mut())
                .expect("disk read failed");
            page.set_id(page_id);
            page.set_pin_count(1);
            page.set_dirty(false);
        }

        Some(page_arc)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.latch.lock().unwrap();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };

        let mut page = self.pool[frame_id].write().unwrap();
        if is_dirty {
            // never clears an earlier dirty mark
            page.set_dirty(true);
        }

        if page.get_pin_count() == 0 {
            return false;
        }

        let new_pin_count = page.get_pin_count() - 1;
        page.set_pin_count(new_pin_count);
        if page.get_pin_count() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    fn flush_page(&self, page_id: PageId) -> bool {
        let inner = self.latch.lock().unwrap();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };

        let mut page = self.pool[frame_id].write().unwrap();
        self.disk_manager
            .lock()
            .unwrap()
            .write_page(page_id, page.get_data())
            .expect("disk write failed");
        page.set_dirty(false);
        true
    }

    fn flush_all_pages(&self) {
        let inner = self.latch.lock().unwrap();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let mut page = self.pool[frame_id].write().unwrap();
            self.disk_manager
                .lock()
                .unwrap()
                .write_page(page_id, page.get_data())
                .expect("disk write failed");
            page.set_dirty(false);
        }
    }

    fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.latch.lock().unwrap();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return true,
        };

        let page_arc = self.pool[frame_id].clone();
        let mut page = page_arc.write().unwrap();
        if page.get_pin_count() > 0 {
            return false;
        }

        if page.is_dirty() {
            self.disk_manager
                .lock()
                .unwrap()
                .write_page(page_id, page.get_data())
                .expect("disk write failed");
        }
        self.disk_manager
            .lock()
            .unwrap()
            .deallocate_page(page_id)
            .expect("disk deallocate failed");

        inner.page_table.remove(&page_id);
        page.reset_memory();
        page.set_id(INVALID_PAGE_ID);
        page.set_pin_count(0);
        page.set_dirty(false);

        self.replacer.pin(frame_id);
        inner.free_list.push_back(frame_id);
        true
    }

    fn get_pool_size(&self) -> usize {
        self.pool_size
    }
}
