//! State store implementations.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "fs")]
pub mod file;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "fs")]
pub use file::FileStore;
