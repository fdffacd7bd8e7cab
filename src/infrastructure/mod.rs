//! Adapters for the domain ports.

pub mod filesystem;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated;
