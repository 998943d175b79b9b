use crate::common::KeyType;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

pub trait HashKeyType: KeyType + Hash {}
impl<T: HashKeyType> KeyType for T {}

impl HashKeyType for i32 {}
impl HashKeyType for i64 {}
impl HashKeyType for u32 {}
impl HashKeyType for u64 {}

pub fn hash<K: HashKeyType>(key: &K) -> u64 {
    let mut hasher: XxHash64 = Default::default();
    key.hash(&mut hasher);
    hasher.finish()
}
