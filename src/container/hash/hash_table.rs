use crate::common::hash::HashKeyType;
use crate::common::ValueType;

/// Unordered key-value index over a buffer pool. Duplicate keys are allowed,
/// duplicate `(key, value)` pairs are not.
pub trait HashTable<K: HashKeyType, V: ValueType> {
    fn insert(&self, key: &K, value: &V) -> bool;

    fn remove(&self, key: &K, value: &V) -> bool;

    fn get_value(&self, key: &K) -> Vec<V>;
}
