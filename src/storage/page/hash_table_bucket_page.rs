use crate::common::hash::HashKeyType;
use crate::common::ValueType;
use crate::storage::page::page::PAGE_SIZE;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::mem;

#[derive(Serialize, Deserialize, Default, Clone)]
#[serde(bound = "K: HashKeyType, V: ValueType")]
pub struct MappingType<K: HashKeyType, V: ValueType> {
    key: K,
    value: V,
}

// The three vectors carry bincode length prefixes the in-memory sizes do not
// account for; derate the page by this allowance so the encoded form always
// fits.
const CODEC_FRAMING: usize = 32;

/// Number of `(key, value)` slots a bucket page holds. Each slot costs its
/// own size plus two bitmap bits, so the capacity is
/// `4 * page / (4 * slot + 1)` over the codec-usable part of the page.
pub fn bucket_array_size<K: HashKeyType, V: ValueType>() -> usize {
    4 * (PAGE_SIZE - CODEC_FRAMING) / (4 * mem::size_of::<MappingType<K, V>>() + 1)
}

/// Bucket of an extendible hash table. A slot is in one of three states:
/// never used (`!occupied`, terminates scans), tombstone (`occupied` but not
/// `readable`), or live (`occupied` and `readable`). `occupied` is never
/// cleared while the bucket lives, so scans may stop at the first unoccupied
/// slot. Latching is the caller's business.
#[derive(Serialize, Deserialize)]
#[serde(bound = "K: HashKeyType, V: ValueType")]
pub struct HashTableBucketPage<K: HashKeyType, V: ValueType> {
    occupied: Vec<u8>,
    readable: Vec<u8>,
    array: Vec<MappingType<K, V>>,
}

impl<K: HashKeyType, V: ValueType> HashTableBucketPage<K, V> {
    pub fn new() -> HashTableBucketPage<K, V> {
        let size = bucket_array_size::<K, V>();
        HashTableBucketPage {
            occupied: vec![0; (size - 1) / 8 + 1],
            readable: vec![0; (size - 1) / 8 + 1],
            array: (0..size).map(|_| MappingType::default()).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.array.len()
    }

    /// Collects the values of every live slot matching `key`, in slot order.
    /// Returns whether anything matched.
    pub fn get_value<C>(&self, key: &K, cmp: &C, result: &mut Vec<V>) -> bool
    where
        C: Fn(&K, &K) -> Ordering,
    {
        let mut found = false;
        for i in 0..self.capacity() {
            if !self.is_occupied(i) {
                break;
            }
            if self.is_readable(i) && cmp(key, &self.array[i].key) == Ordering::Equal {
                result.push(self.array[i].value.clone());
                found = true;
            }
        }
        found
    }

    /// Places the pair in the first never-used or tombstone slot. Rejects an
    /// exact `(key, value)` duplicate and a bucket with no slot left.
    pub fn insert<C>(&mut self, key: &K, value: &V, cmp: &C) -> bool
    where
        C: Fn(&K, &K) -> Ordering,
    {
        let capacity = self.capacity();
        let mut available = capacity;

        for i in 0..capacity {
            if !self.is_occupied(i) {
                if available == capacity {
                    available = i;
                }
                break;
            }

            if self.is_readable(i) {
                if cmp(key, &self.array[i].key) == Ordering::Equal && *value == self.array[i].value
                {
                    debug!("rejecting duplicate pair for existing key");
                    return false;
                }
            } else if available == capacity {
                available = i;
            }
        }

        if available == capacity {
            debug!("bucket page is full");
            return false;
        }

        self.array[available] = MappingType {
            key: key.clone(),
            value: value.clone(),
        };
        self.set_occupied(available);
        self.set_readable(available);
        true
    }

    /// Tombstones the slot holding the exact pair; `occupied` stays set.
    pub fn remove<C>(&mut self, key: &K, value: &V, cmp: &C) -> bool
    where
        C: Fn(&K, &K) -> Ordering,
    {
        for i in 0..self.capacity() {
            if !self.is_occupied(i) {
                break;
            }
            if self.is_readable(i)
                && cmp(key, &self.array[i].key) == Ordering::Equal
                && *value == self.array[i].value
            {
                self.remove_at(i);
                return true;
            }
        }
        false
    }

    pub fn key_at(&self, bucket_idx: usize) -> K {
        self.array[bucket_idx].key.clone()
    }

    pub fn value_at(&self, bucket_idx: usize) -> V {
        self.array[bucket_idx].value.clone()
    }

    pub fn remove_at(&mut self, bucket_idx: usize) {
        self.readable[bucket_idx / 8] &= !(0x1 << (bucket_idx % 8));
    }

    pub fn is_occupied(&self, bucket_idx: usize) -> bool {
        self.occupied[bucket_idx / 8] & (0x1 << (bucket_idx % 8)) != 0
    }

    pub fn set_occupied(&mut self, bucket_idx: usize) {
        self.occupied[bucket_idx / 8] |= 0x1 << (bucket_idx % 8);
    }

    pub fn is_readable(&self, bucket_idx: usize) -> bool {
        self.readable[bucket_idx / 8] & (0x1 << (bucket_idx % 8)) != 0
    }

    pub fn set_readable(&mut self, bucket_idx: usize) {
        self.readable[bucket_idx / 8] |= 0x1 << (bucket_idx % 8);
    }

    pub fn is_empty(&self) -> bool {
        self.readable.iter().all(|byte| *byte == 0)
    }

    pub fn is_full(&self) -> bool {
        (0..self.capacity()).all(|i| self.is_occupied(i) && self.is_readable(i))
    }

    pub fn num_readable(&self) -> u32 {
        self.readable.iter().map(|byte| byte.count_ones()).sum()
    }

    pub fn print_bucket(&self) {
        let mut size = 0;
        let mut taken = 0;
        for bucket_idx in 0..self.capacity() {
            if !self.is_occupied(bucket_idx) {
                break;
            }
            size += 1;
            if self.is_readable(bucket_idx) {
                taken += 1;
            }
        }
        debug!(
            "bucket capacity: {}, size: {}, taken: {}, free: {}",
            self.capacity(),
            size,
            taken,
            size - taken
        );
    }

    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }

    pub fn deserialize(data: &[u8]) -> HashTableBucketPage<K, V> {
        bincode::deserialize(data).unwrap()
    }
}

impl<K: HashKeyType, V: ValueType> Default for HashTableBucketPage<K, V> {
    fn default() -> Self {
        HashTableBucketPage::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &i32, b: &i32) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn should_construct_new_empty_bucket() {
        let bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();

        assert_eq!(bucket.capacity(), bucket_array_size::<i32, i32>());
        assert!(bucket.is_empty());
        assert!(!bucket.is_full());
        assert_eq!(bucket.num_readable(), 0);
    }

    #[test]
    fn should_fit_encoded_full_bucket_in_one_page() {
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();
        for i in 0..bucket.capacity() {
            assert!(bucket.insert(&(i as i32), &i32::MAX, &cmp));
        }
        assert!(bucket.is_full());

        let encoded = bucket.serialize();
        assert!(encoded.len() <= PAGE_SIZE);

        let decoded: HashTableBucketPage<i32, i32> = HashTableBucketPage::deserialize(&encoded);
        assert!(decoded.is_full());
        assert_eq!(decoded.key_at(3), 3);
    }

    #[test]
    fn should_test_occupied_bit_pattern() {
        // given
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();
        bucket.occupied[10] = 0b0010_1000;

        // when
        let is_occupied_83 = bucket.is_occupied(83);
        let is_occupied_85 = bucket.is_occupied(85);
        let not_occupied_86 = bucket.is_occupied(86);

        // then
        assert!(is_occupied_83);
        assert!(is_occupied_85);
        assert!(!not_occupied_86);
    }

    #[test]
    fn should_get_all_values_for_key() {
        // given: a multimap bucket with two values under one key
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();
        assert!(bucket.insert(&7, &70, &cmp));
        assert!(bucket.insert(&8, &80, &cmp));
        assert!(bucket.insert(&7, &71, &cmp));

        // when
        let mut result = vec![];
        let found = bucket.get_value(&7, &cmp, &mut result);

        // then
        assert!(found);
        assert_eq!(result, vec![70, 71]);

        let mut missing = vec![];
        assert!(!bucket.get_value(&9, &cmp, &mut missing));
        assert!(missing.is_empty());
    }

    #[test]
    fn should_reject_duplicate_pair_but_allow_new_value() {
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();

        assert!(bucket.insert(&7, &77, &cmp));
        assert!(!bucket.insert(&7, &77, &cmp));
        assert!(bucket.insert(&7, &78, &cmp));
        assert_eq!(bucket.num_readable(), 2);
    }

    #[test]
    fn should_keep_occupied_set_after_remove() {
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();
        assert!(bucket.insert(&1, &10, &cmp));
        assert!(bucket.insert(&2, &20, &cmp));

        assert!(bucket.remove(&1, &10, &cmp));
        assert!(!bucket.remove(&1, &10, &cmp));

        // slot 0 became a tombstone, not a scan terminator
        assert!(bucket.is_occupied(0));
        assert!(!bucket.is_readable(0));
        let mut result = vec![];
        assert!(bucket.get_value(&2, &cmp, &mut result));
        assert_eq!(result, vec![20]);
    }

    #[test]
    fn should_reclaim_tombstone_slot_on_insert() {
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();
        assert!(bucket.insert(&1, &10, &cmp));
        assert!(bucket.insert(&2, &20, &cmp));
        assert!(bucket.remove(&1, &10, &cmp));

        assert!(bucket.insert(&3, &30, &cmp));

        // the tombstone at slot 0 was reused
        assert_eq!(bucket.key_at(0), 3);
        assert_eq!(bucket.value_at(0), 30);
        assert_eq!(bucket.num_readable(), 2);
    }

    #[test]
    fn should_report_full_when_every_slot_is_live() {
        let mut bucket: HashTableBucketPage<i32, i32> = HashTableBucketPage::new();
        let capacity = bucket.capacity() as i32;

        for i in 0..capacity {
            assert!(bucket.insert(&i, &(i * 10), &cmp));
        }
        assert!(bucket.is_full());
        assert_eq!(bucket.num_readable(), capacity as u32);

        // no slot left
        assert!(!bucket.insert(&capacity, &0, &cmp));

        // a tombstone makes room again
        assert!(bucket.remove(&0, &0, &cmp));
        assert!(!bucket.is_full());
        assert!(bucket.insert(&capacity, &0, &cmp));
    }
}
