use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod hash;

pub trait KeyType: Default + Clone + Serialize + DeserializeOwned {}
pub trait ValueType: Default + Clone + PartialEq + Serialize + DeserializeOwned {}

impl ValueType for i32 {}
impl ValueType for i64 {}
impl ValueType for u32 {}
impl ValueType for u64 {}
