//! Worker memory: context injection, observation recording, compression.

pub mod manager;

pub use manager::MemoryManager;
