pub mod buffer;
pub mod common;
pub mod container;
pub mod storage;

pub use crate::buffer::buffer_pool_manager::{BufferPoolManager, BufferPoolManagerInstance};
pub use crate::buffer::parallel_buffer_pool_manager::ParallelBufferPoolManager;
pub use crate::buffer::replacer::{LruReplacer, Replacer};
pub use crate::container::hash::extendible_hash_table::ExtendibleHashTable;
pub use crate::container::hash::hash_table::HashTable;
pub use crate::storage::disk::disk_manager::{DiskManager, FakeDiskManager, FileDiskManager};
pub use crate::storage::page::page::Page;
