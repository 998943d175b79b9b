use crate::storage::page::page::{PageId, INVALID_PAGE_ID};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DIRECTORY_ARRAY_SIZE: usize = 512;
pub const MAX_GLOBAL_DEPTH: u32 = 9;

/// Directory of an extendible hash table: maps the low `global_depth` bits of
/// a key's hash to a bucket page. Kept as a typed struct and codec'd through
/// the 4 KiB page it lives in; concurrency is the caller's business.
#[derive(Serialize, Deserialize)]
pub struct HashTableDirectoryPage {
    page_id: PageId,
    lsn: u32,
    global_depth: u32,
    local_depths: Vec<u8>,
    bucket_page_ids: Vec<PageId>,
}

impl HashTableDirectoryPage {
    pub fn new(page_id: PageId) -> HashTableDirectoryPage {
        HashTableDirectoryPage {
            page_id,
            lsn: 0,
            global_depth: 0,
            local_depths: vec![0; DIRECTORY_ARRAY_SIZE],
            bucket_page_ids: vec![INVALID_PAGE_ID; DIRECTORY_ARRAY_SIZE],
        }
    }

    pub fn get_page_id(&self) -> PageId {
        self.page_id
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    pub fn get_lsn(&self) -> u32 {
        self.lsn
    }

    pub fn set_lsn(&mut self, lsn: u32) {
        self.lsn = lsn;
    }

    pub fn get_global_depth(&self) -> u32 {
        self.global_depth
    }

    pub fn get_global_depth_mask(&self) -> u32 {
        (1 << self.global_depth) - 1
    }

    pub fn incr_global_depth(&mut self) {
        assert!(self.global_depth < MAX_GLOBAL_DEPTH);
        self.global_depth += 1;
    }

    pub fn decr_global_depth(&mut self) {
        assert!(self.global_depth > 0);
        self.global_depth -= 1;
    }

    pub fn size(&self) -> usize {
        1 << self.global_depth
    }

    pub fn get_bucket_page_id(&self, bucket_idx: usize) -> PageId {
        self.bucket_page_ids[bucket_idx]
    }

    pub fn set_bucket_page_id(&mut self, bucket_idx: usize, bucket_page_id: PageId) {
        self.bucket_page_ids[bucket_idx] = bucket_page_id;
    }

    pub fn get_local_depth(&self, bucket_idx: usize) -> u32 {
        self.local_depths[bucket_idx] as u32
    }

    pub fn set_local_depth(&mut self, bucket_idx: usize, local_depth: u32) {
        self.local_depths[bucket_idx] = local_depth as u8;
    }

    pub fn incr_local_depth(&mut self, bucket_idx: usize) {
        self.local_depths[bucket_idx] += 1;
    }

    pub fn decr_local_depth(&mut self, bucket_idx: usize) {
        self.local_depths[bucket_idx] -= 1;
    }

    /// The bit distinguishing `bucket_idx` from its split image at the
    /// current local depth.
    pub fn get_local_high_bit(&self, bucket_idx: usize) -> usize {
        1 << self.local_depths[bucket_idx]
    }

    /// The directory may halve only while no bucket uses all global-depth
    /// bits.
    pub fn can_shrink(&self) -> bool {
        (0..self.size()).all(|i| (self.local_depths[i] as u32) < self.global_depth)
    }

    /// Smallest directory slot pointing at `bucket_page_id`.
    pub fn find_first_bucket(&self, bucket_page_id: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.bucket_page_ids[i] == bucket_page_id)
    }

    /// Checks the structural invariants:
    /// (1) every local depth is at most the global depth;
    /// (2) each bucket page is referenced by exactly 2^(GD - LD) slots;
    /// (3) all slots referencing one bucket page agree on its local depth.
    /// Violations are fatal.
    pub fn verify_integrity(&self) {
        let mut page_id_to_count: HashMap<PageId, u32> = HashMap::new();
        let mut page_id_to_ld: HashMap<PageId, u32> = HashMap::new();

        for curr_idx in 0..self.size() {
            let curr_page_id = self.bucket_page_ids[curr_idx];
            let curr_ld = self.local_depths[curr_idx] as u32;
            assert!(curr_ld <= self.global_depth);

            *page_id_to_count.entry(curr_page_id).or_insert(0) += 1;

            match page_id_to_ld.get(&curr_page_id) {
                Some(&old_ld) if old_ld != curr_ld => {
                    warn!(
                        "verify integrity: local depth {} does not match earlier {} for page {}",
                        curr_ld, old_ld, curr_page_id
                    );
                    self.print_directory();
                    panic!("inconsistent local depth for page {}", curr_page_id);
                }
                Some(_) => {}
                None => {
                    page_id_to_ld.insert(curr_page_id, curr_ld);
                }
            }
        }

        for (curr_page_id, curr_count) in page_id_to_count {
            let curr_ld = page_id_to_ld[&curr_page_id];
            let required_count = 0x1 << (self.global_depth - curr_ld);
            if curr_count != required_count {
                warn!(
                    "verify integrity: {} references to page {}, expected {}",
                    curr_count, curr_page_id, required_count
                );
                self.print_directory();
                panic!("wrong reference count for page {}", curr_page_id);
            }
        }
    }

    pub fn print_directory(&self) {
        debug!("======== directory (global_depth: {}) ========", self.global_depth);
        debug!("| bucket_idx | page_id | local_depth |");
        for idx in 0..self.size() {
            debug!(
                "| {} | {} | {} |",
                idx, self.bucket_page_ids[idx], self.local_depths[idx]
            );
        }
        debug!("================ end directory ================");
    }

    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }

    pub fn deserialize(data: &[u8]) -> HashTableDirectoryPage {
        bincode::deserialize(data).unwrap()
    }
}
