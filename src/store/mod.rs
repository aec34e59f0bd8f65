//! Generation store
//!
//! Persists cached resource sets, one per generation. Writes happen only
//! as whole batches at install and whole-generation deletes at activation;
//! fetch interception only reads.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::ShellCacheResult;
use crate::generation::GenerationId;
use crate::http::{CacheKey, Response};
use async_trait::async_trait;

/// Abstract storage backend for cache generations
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if absent; returns true if it was created
    async fn open(&self, generation: &GenerationId) -> ShellCacheResult<bool>;

    /// Store a batch of responses in an opened generation
    async fn put_all(
        &self,
        generation: &GenerationId,
        entries: Vec<(CacheKey, Response)>,
    ) -> ShellCacheResult<()>;

    /// Look up one entry; `None` on a miss or an unknown generation
    async fn lookup(
        &self,
        generation: &GenerationId,
        key: &CacheKey,
    ) -> ShellCacheResult<Option<Response>>;

    /// Keys stored in a generation, sorted
    async fn entries(&self, generation: &GenerationId) -> ShellCacheResult<Vec<CacheKey>>;

    /// All stored generations, sorted
    async fn generations(&self) -> ShellCacheResult<Vec<GenerationId>>;

    /// Delete a whole generation; returns false if it did not exist
    async fn delete(&self, generation: &GenerationId) -> ShellCacheResult<bool>;

    /// Last activated generation, if recorded
    async fn active(&self) -> ShellCacheResult<Option<GenerationId>>;

    /// Record the activated generation
    async fn set_active(&self, generation: &GenerationId) -> ShellCacheResult<()>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
