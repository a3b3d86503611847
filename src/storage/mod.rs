//! Local key-value persistence for schedules and their execution history

mod file;
mod memory;
mod service;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use service::{StorageChange, StorageService};

use crate::errors::Result;

/// String key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
