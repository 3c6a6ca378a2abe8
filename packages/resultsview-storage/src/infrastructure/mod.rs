//! Infrastructure layer - RunIndex adapters

pub mod memory;

pub use memory::ConcurrentIndex;
