//! Key-value backing store consumed by the service core.
//!
//! All cross-request coordination lives behind this trait: implementations
//! must make [`Store::increment`] atomic so concurrent registrations never
//! observe the same id, even across several service instances.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use crate::errors::StoreError;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Atomically increments `key` and returns the post-increment value.
    async fn increment(&self, key: &str) -> Result<u64, StoreError>;

    /// Upserts named fields into the record at `key`, creating it if absent.
    /// Fields not named keep their current values.
    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    /// Adds `member` to the set at `key`. Adding an existing member is a no-op.
    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError>;
}
