//! Collaborator implementations.

pub mod memory;

pub use memory::{MemoryMessageBus, MemoryObjectStore, MemoryTabularStore, PublishedMessage};
