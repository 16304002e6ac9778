pub mod in_memory_stats;
pub mod worker_pool;
pub mod zip_bundler;
