//! Resource pool collaborator: grouping keys and remaining issuable capacity.

#![deny(unsafe_code)]

pub mod memory;
pub mod traits;

pub use memory::InMemoryResourcePool;
pub use traits::ResourcePool;
