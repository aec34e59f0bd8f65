//! In-memory generation store

use super::CacheStore;
use crate::error::ShellCacheResult;
use crate::generation::GenerationId;
use crate::http::{CacheKey, Response};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    generations: BTreeMap<GenerationId, HashMap<CacheKey, Response>>,
    active: Option<GenerationId>,
}

/// Store holding every generation in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, generation: &GenerationId) -> ShellCacheResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.generations.contains_key(generation) {
            return Ok(false);
        }
        inner.generations.insert(generation.clone(), HashMap::new());
        debug!(generation = %generation, "Opened memory generation");
        Ok(true)
    }

    async fn put_all(
        &self,
        generation: &GenerationId,
        entries: Vec<(CacheKey, Response)>,
    ) -> ShellCacheResult<()> {
        let mut inner = self.inner.write().await;
        let set = inner.generations.entry(generation.clone()).or_default();
        set.extend(entries);
        Ok(())
    }

    async fn lookup(
        &self,
        generation: &GenerationId,
        key: &CacheKey,
    ) -> ShellCacheResult<Option<Response>> {
        let inner = self.inner.read().await;
        Ok(inner
            .generations
            .get(generation)
            .and_then(|set| set.get(key))
            .cloned())
    }

    async fn entries(&self, generation: &GenerationId) -> ShellCacheResult<Vec<CacheKey>> {
        let inner = self.inner.read().await;
        let mut keys: Vec<CacheKey> = inner
            .generations
            .get(generation)
            .map(|set| set.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn generations(&self) -> ShellCacheResult<Vec<GenerationId>> {
        let inner = self.inner.read().await;
        Ok(inner.generations.keys().cloned().collect())
    }

    async fn delete(&self, generation: &GenerationId) -> ShellCacheResult<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.generations.remove(generation).is_some();
        if inner.active.as_ref() == Some(generation) {
            inner.active = None;
        }
        Ok(existed)
    }

    async fn active(&self) -> ShellCacheResult<Option<GenerationId>> {
        Ok(self.inner.read().await.active.clone())
    }

    async fn set_active(&self, generation: &GenerationId) -> ShellCacheResult<()> {
        self.inner.write().await.active = Some(generation.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
