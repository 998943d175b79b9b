pub mod buffer_pool_manager;
pub mod parallel_buffer_pool_manager;
pub mod replacer;
