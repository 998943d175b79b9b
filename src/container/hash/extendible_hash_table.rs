use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::hash::{hash, HashKeyType};
use crate::common::ValueType;
use crate::container::hash::hash_table::HashTable;
use crate::storage::page::hash_table_bucket_page::HashTableBucketPage;
use crate::storage::page::hash_table_directory_page::{
    HashTableDirectoryPage, MAX_GLOBAL_DEPTH,
};
use crate::storage::page::page::{Page, PageId, INVALID_PAGE_ID};
use log::debug;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

/// Extendible hash table whose directory and buckets are ordinary pages of
/// the buffer pool.
///
/// The table latch serializes structural changes (`split_insert`, `merge`,
/// both writers) against everything else; plain lookups, inserts and removes
/// run concurrently under the reader side and rely on the per-page latches.
/// Every fetched page is unpinned after its last use.
pub struct ExtendibleHashTable<K, V, C, B>
where
    K: HashKeyType,
    V: ValueType,
    C: Fn(&K, &K) -> Ordering,
    B: BufferPoolManager,
{
    directory_page_id: PageId,
    buffer_pool_manager: Arc<B>,
    comparator: C,
    hash_fn: fn(&K) -> u64,
    table_latch: RwLock<()>,
    _values: PhantomData<V>,
}

impl<K, V, C, B> ExtendibleHashTable<K, V, C, B>
where
    K: HashKeyType,
    V: ValueType,
    C: Fn(&K, &K) -> Ordering,
    B: BufferPoolManager,
{
    pub fn new(buffer_pool_manager: Arc<B>, comparator: C) -> ExtendibleHashTable<K, V, C, B> {
        ExtendibleHashTable::with_hash_fn(buffer_pool_manager, comparator, hash::<K>)
    }

    /// The hash function is injectable so callers (and tests) can control
    /// key placement; `common::hash::hash` is the default.
    pub fn with_hash_fn(
        buffer_pool_manager: Arc<B>,
        comparator: C,
        hash_fn: fn(&K) -> u64,
    ) -> ExtendibleHashTable<K, V, C, B> {
        let directory_page = buffer_pool_manager
            .new_page()
            .expect("failed to allocate the directory page");
        let directory_page_id = directory_page.read().unwrap().get_id();

        let bucket_page = buffer_pool_manager
            .new_page()
            .expect("failed to allocate the first bucket page");
        let bucket_page_id = bucket_page.read().unwrap().get_id();

        let mut directory = HashTableDirectoryPage::new(directory_page_id);
        directory.set_bucket_page_id(0, bucket_page_id);
        directory.set_local_depth(0, 0);
        Self::encode_directory(&mut directory_page.write().unwrap(), &directory);

        let bucket: HashTableBucketPage<K, V> = HashTableBucketPage::new();
        Self::encode_bucket(&mut bucket_page.write().unwrap(), &bucket);

        buffer_pool_manager.unpin_page(directory_page_id, true);
        buffer_pool_manager.unpin_page(bucket_page_id, true);

        ExtendibleHashTable {
            directory_page_id,
            buffer_pool_manager,
            comparator,
            hash_fn,
            table_latch: RwLock::new(()),
            _values: PhantomData,
        }
    }

    pub fn get_global_depth(&self) -> u32 {
        let _table = self.table_latch.read().unwrap();

        let (_directory_page, directory) = self.fetch_directory();
        let global_depth = directory.get_global_depth();
        assert!(self
            .buffer_pool_manager
            .unpin_page(self.directory_page_id, false));
        global_depth
    }

    pub fn verify_integrity(&self) {
        let _table = self.table_latch.read().unwrap();

        let (_directory_page, directory) = self.fetch_directory();
        directory.verify_integrity();
        assert!(self
            .buffer_pool_manager
            .unpin_page(self.directory_page_id, false));
    }

    fn hash_of(&self, key: &K) -> u32 {
        (self.hash_fn)(key) as u32
    }

    fn key_to_directory_index(&self, key: &K, directory: &HashTableDirectoryPage) -> usize {
        (self.hash_of(key) & directory.get_global_depth_mask()) as usize
    }

    fn key_to_page_id(&self, key: &K, directory: &HashTableDirectoryPage) -> PageId {
        directory.get_bucket_page_id(self.key_to_directory_index(key, directory))
    }

    /// Pins the directory page and decodes a snapshot of it. The snapshot is
    /// stable for as long as the caller holds its table latch: only writers
    /// re-encode the directory.
    fn fetch_directory(&self) -> (Arc<RwLock<Page>>, HashTableDirectoryPage) {
        let page = self
            .buffer_pool_manager
            .fetch_page(self.directory_page_id)
            .expect("failed to fetch the directory page");
        let directory = HashTableDirectoryPage::deserialize(page.read().unwrap().get_data());
        (page, directory)
    }

    fn fetch_bucket_page(&self, bucket_page_id: PageId) -> Arc<RwLock<Page>> {
        self.buffer_pool_manager
            .fetch_page(bucket_page_id)
            .expect("failed to fetch a bucket page")
    }

    fn encode_directory(page: &mut Page, directory: &HashTableDirectoryPage) {
        let encoded = directory.serialize();
        page.get_data_mut()[..encoded.len()].copy_from_slice(&encoded);
    }

    fn encode_bucket(page: &mut Page, bucket: &HashTableBucketPage<K, V>) {
        let encoded = bucket.serialize();
        page.get_data_mut()[..encoded.len()].copy_from_slice(&encoded);
    }

    /// Splits the bucket the key hashes to, growing the directory when the
    /// bucket already uses every global bit, then retries the insert from the
    /// top. The retry, not recursion, handles the case where the new record
    /// still lands in a full bucket.
    fn split_insert(&self, key: &K, value: &V) -> bool {
        {
            let _table = self.table_latch.write().unwrap();

            let (directory_page, mut directory) = self.fetch_directory();
            let bucket_idx = self.key_to_directory_index(key, &directory);
            let old_bucket_page_id = directory.get_bucket_page_id(bucket_idx);

            if directory.get_local_depth(bucket_idx) == directory.get_global_depth() {
                if directory.get_global_depth() == MAX_GLOBAL_DEPTH {
                    // the directory cannot double any further
                    self.buffer_pool_manager
                        .unpin_page(self.directory_page_id, false);
                    return false;
                }

                directory.incr_global_depth();
                let half = directory.size() / 2;
                for i in 0..half {
                    directory.set_bucket_page_id(i + half, directory.get_bucket_page_id(i));
                    directory.set_local_depth(i + half, directory.get_local_depth(i));
                }
                debug!(
                    "directory doubled to global depth {}",
                    directory.get_global_depth()
                );
            }

            let new_bucket_page = match self.buffer_pool_manager.new_page() {
                Some(page) => page,
                None => {
                    self.buffer_pool_manager
                        .unpin_page(self.directory_page_id, false);
                    return false;
                }
            };
            let new_bucket_page_id = new_bucket_page.read().unwrap().get_id();

            let old_bucket_page = self.fetch_bucket_page(old_bucket_page_id);
            let mut old_bucket =
                HashTableBucketPage::<K, V>::deserialize(old_bucket_page.read().unwrap().get_data());
            let mut new_bucket: HashTableBucketPage<K, V> = HashTableBucketPage::new();

            // Walk the slots referencing the old bucket (one arithmetic
            // progression per local depth); each slot's split image moves to
            // the new bucket and both sides gain a depth bit.
            let mut bucket_idx = directory
                .find_first_bucket(old_bucket_page_id)
                .expect("split bucket is not referenced by the directory");
            while bucket_idx < directory.size() {
                let image_idx = bucket_idx + directory.get_local_high_bit(bucket_idx);
                directory.set_bucket_page_id(image_idx, new_bucket_page_id);
                directory.incr_local_depth(bucket_idx);
                directory.set_local_depth(image_idx, directory.get_local_depth(bucket_idx));
                bucket_idx += directory.get_local_high_bit(bucket_idx);
            }

            // rehash: records whose slot now resolves elsewhere move over
            for slot in 0..old_bucket.capacity() {
                if !old_bucket.is_occupied(slot) {
                    break;
                }
                if !old_bucket.is_readable(slot) {
                    continue;
                }
                let slot_key = old_bucket.key_at(slot);
                if self.key_to_page_id(&slot_key, &directory) == old_bucket_page_id {
                    continue;
                }
                let slot_value = old_bucket.value_at(slot);
                old_bucket.remove_at(slot);
                new_bucket.insert(&slot_key, &slot_value, &self.comparator);
            }
            debug!(
                "split bucket {} into new bucket {}",
                old_bucket_page_id, new_bucket_page_id
            );

            Self::encode_directory(&mut directory_page.write().unwrap(), &directory);
            Self::encode_bucket(&mut old_bucket_page.write().unwrap(), &old_bucket);
            Self::encode_bucket(&mut new_bucket_page.write().unwrap(), &new_bucket);

            self.buffer_pool_manager
                .unpin_page(self.directory_page_id, true);
            self.buffer_pool_manager.unpin_page(old_bucket_page_id, true);
            self.buffer_pool_manager.unpin_page(new_bucket_page_id, true);
        }

        self.insert(key, value)
    }

    /// Folds the key's bucket and its split image back into one bucket when
    /// exactly one of them is empty, freeing the emptied page and shrinking
    /// the directory as far as it will go. One merge can expose the next, so
    /// the protocol re-runs itself until an abort condition holds.
    fn merge(&self, key: &K, value: &V) {
        {
            let _table = self.table_latch.write().unwrap();

            let (directory_page, mut directory) = self.fetch_directory();
            let bucket_idx = self.key_to_directory_index(key, &directory);
            let local_depth = directory.get_local_depth(bucket_idx);

            if local_depth == 0 {
                self.buffer_pool_manager
                    .unpin_page(self.directory_page_id, false);
                return;
            }

            let merge_idx = bucket_idx ^ (1 << (local_depth - 1));
            if directory.get_local_depth(merge_idx) != local_depth {
                self.buffer_pool_manager
                    .unpin_page(self.directory_page_id, false);
                return;
            }

            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
            let merge_page_id = directory.get_bucket_page_id(merge_idx);

            let bucket_page = self.fetch_bucket_page(bucket_page_id);
            let bucket_empty = HashTableBucketPage::<K, V>::deserialize(
                bucket_page.read().unwrap().get_data(),
            )
            .is_empty();
            let merge_page = self.fetch_bucket_page(merge_page_id);
            let merge_empty = HashTableBucketPage::<K, V>::deserialize(
                merge_page.read().unwrap().get_data(),
            )
            .is_empty();

            if bucket_empty == merge_empty {
                self.buffer_pool_manager.unpin_page(bucket_page_id, false);
                self.buffer_pool_manager.unpin_page(merge_page_id, false);
                self.buffer_pool_manager
                    .unpin_page(self.directory_page_id, false);
                return;
            }

            let (survivor_page_id, empty_page_id) = if bucket_empty {
                (merge_page_id, bucket_page_id)
            } else {
                (bucket_page_id, merge_page_id)
            };

            // collapse both slot progressions onto the survivor, one depth
            // bit lower
            let stride = 1 << (local_depth - 1);
            let mut slot = bucket_idx & (stride - 1);
            while slot < directory.size() {
                directory.set_bucket_page_id(slot, survivor_page_id);
                directory.set_local_depth(slot, local_depth - 1);
                slot += stride;
            }
            debug!(
                "merged empty bucket {} into {}",
                empty_page_id, survivor_page_id
            );

            self.buffer_pool_manager.unpin_page(bucket_page_id, false);
            self.buffer_pool_manager.unpin_page(merge_page_id, false);
            // freed here unless the caller still pins it; then the page just
            // ages out of the pool
            self.buffer_pool_manager.delete_page(empty_page_id);

            while directory.can_shrink() {
                let half = directory.size() / 2;
                for upper in half..directory.size() {
                    // a collapsible directory must mirror its halves
                    assert_eq!(
                        directory.get_bucket_page_id(upper),
                        directory.get_bucket_page_id(upper - half)
                    );
                    directory.set_bucket_page_id(upper, INVALID_PAGE_ID);
                    directory.set_local_depth(upper, 0);
                }
                directory.decr_global_depth();
                debug!(
                    "directory shrunk to global depth {}",
                    directory.get_global_depth()
                );
            }

            Self::encode_directory(&mut directory_page.write().unwrap(), &directory);
            self.buffer_pool_manager
                .unpin_page(self.directory_page_id, true);
        }

        self.merge(key, value)
    }
}

impl<K, V, C, B> HashTable<K, V> for ExtendibleHashTable<K, V, C, B>
where
    K: HashKeyType,
    V: ValueType,
    C: Fn(&K, &K) -> Ordering,
    B: BufferPoolManager,
{
    fn insert(&self, key: &K, value: &V) -> bool {
        {
            let _table = self.table_latch.read().unwrap();

            let (_directory_page, directory) = self.fetch_directory();
            let bucket_page_id = self.key_to_page_id(key, &directory);
            let bucket_page = self.fetch_bucket_page(bucket_page_id);

            let mut guard = bucket_page.write().unwrap();
            let mut bucket = HashTableBucketPage::<K, V>::deserialize(guard.get_data());
            if !bucket.is_full() {
                let inserted = bucket.insert(key, value, &self.comparator);
                if inserted {
                    Self::encode_bucket(&mut guard, &bucket);
                }
                drop(guard);

                self.buffer_pool_manager
                    .unpin_page(self.directory_page_id, false);
                self.buffer_pool_manager.unpin_page(bucket_page_id, inserted);
                return inserted;
            }
            drop(guard);

            self.buffer_pool_manager
                .unpin_page(self.directory_page_id, false);
            self.buffer_pool_manager.unpin_page(bucket_page_id, false);
        }

        self.split_insert(key, value)
    }

    fn remove(&self, key: &K, value: &V) -> bool {
        let mut table = self.table_latch.read().unwrap();

        let (_directory_page, directory) = self.fetch_directory();
        let bucket_idx = self.key_to_directory_index(key, &directory);
        let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
        let bucket_page = self.fetch_bucket_page(bucket_page_id);

        let removed = {
            let mut guard = bucket_page.write().unwrap();
            let mut bucket = HashTableBucketPage::<K, V>::deserialize(guard.get_data());
            let removed = bucket.remove(key, value, &self.comparator);
            if removed {
                Self::encode_bucket(&mut guard, &bucket);
            }
            removed
        };

        let needs_merge = {
            let guard = bucket_page.read().unwrap();
            let bucket = HashTableBucketPage::<K, V>::deserialize(guard.get_data());
            let local_depth = directory.get_local_depth(bucket_idx);
            bucket.is_empty()
                && local_depth > 0
                && directory.get_local_depth(bucket_idx ^ (1 << (local_depth - 1))) == local_depth
        };

        if needs_merge {
            // structural work needs the writer latch; drop the reader side
            // first, never upgrade
            drop(table);
            self.merge(key, value);
            table = self.table_latch.read().unwrap();
        }

        self.buffer_pool_manager
            .unpin_page(self.directory_page_id, true);
        self.buffer_pool_manager.unpin_page(bucket_page_id, removed);
        drop(table);

        removed
    }

    fn get_value(&self, key: &K) -> Vec<V> {
        let _table = self.table_latch.read().unwrap();

        let (_directory_page, directory) = self.fetch_directory();
        let bucket_page_id = self.key_to_page_id(key, &directory);
        let bucket_page = self.fetch_bucket_page(bucket_page_id);

        let mut result = vec![];
        {
            let guard = bucket_page.read().unwrap();
            let bucket = HashTableBucketPage::<K, V>::deserialize(guard.get_data());
            bucket.get_value(key, &self.comparator, &mut result);
        }

        self.buffer_pool_manager
            .unpin_page(self.directory_page_id, false);
        self.buffer_pool_manager.unpin_page(bucket_page_id, false);

        result
    }
}
