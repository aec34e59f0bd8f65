//! Offline cache manager
//!
//! Drives the three lifecycle signals of an app-shell worker:
//!
//! - **install**: populate a new generation from the manifest, all or nothing
//! - **activate**: retire every generation except the current one
//! - **fetch**: answer requests from the current generation, falling back
//!   to the network
//!
//! The manager is host-agnostic: storage and origin are injected as trait
//! objects, so independent instances can run side by side.

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::generation::{GenerationId, WorkerState};
use crate::http::{CacheKey, Method, Request, Response};
use crate::manifest::{Manifest, ManifestEntry};
use crate::network::Network;
use crate::policy::{BypassPolicy, Decision, NON_GET_RULE};
use crate::store::CacheStore;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle interface a host drives
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    /// Populate the worker's generation from the manifest
    async fn on_install(&self, manifest: &Manifest) -> ShellCacheResult<InstallReport>;

    /// Make `current` the only stored generation
    async fn on_activate(&self, current: &GenerationId) -> ShellCacheResult<ActivateReport>;

    /// Answer one intercepted request
    async fn on_fetch(&self, request: &Request) -> ShellCacheResult<Served>;
}

/// Result of a successful install
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub generation: GenerationId,
    /// Stored URLs, in manifest order
    pub stored: Vec<Url>,
    pub bytes: u64,
    /// Whether the generation was created by this install
    pub created: bool,
}

/// Result of an activation
#[derive(Debug, Clone)]
pub struct ActivateReport {
    pub retained: GenerationId,
    pub evicted: Vec<GenerationId>,
    /// Generations whose deletion failed, with the reason
    pub failed: Vec<(GenerationId, String)>,
}

impl ActivateReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Where a served response came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Current generation
    Cache,
    /// Cache miss (or unreadable store) answered by the origin
    Network,
    /// Policy rule forwarded the request untouched
    Bypass(String),
    /// Worker not activated; request passed through
    Inactive,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::Bypass(rule) => write!(f, "bypass ({})", rule),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Response plus its provenance
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

/// Cache manager for one generation
pub struct OfflineCacheManager {
    generation: GenerationId,
    scope: Url,
    policy: BypassPolicy,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
}

impl OfflineCacheManager {
    /// Create a manager in the `parsed` state
    ///
    /// `scope` is the base URL manifest paths resolve against.
    pub fn new(
        generation: GenerationId,
        scope: Url,
        policy: BypassPolicy,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            generation,
            scope,
            policy,
            store,
            network,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn generation(&self) -> &GenerationId {
        &self.generation
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn policy(&self) -> &BypassPolicy {
        &self.policy
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Move to `next`, rejecting illegal transitions
    async fn transition(&self, next: WorkerState) -> ShellCacheResult<()> {
        let mut state = self.state.write().await;
        if !state.can_transition_to(next) {
            return Err(ShellCacheError::InvalidTransition {
                from: state.to_string(),
                to: next.to_string(),
            });
        }
        let from = *state;
        debug!(generation = %self.generation, from = %from, to = %next, "Worker state change");
        *state = next;
        Ok(())
    }

    async fn force_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Pick up a worker activated by an earlier process
    ///
    /// Returns true if the store's active pointer names this generation.
    pub async fn resume(&self) -> ShellCacheResult<bool> {
        if self.state().await.is_serving() {
            return Ok(true);
        }
        if self.store.active().await?.as_ref() != Some(&self.generation) {
            return Ok(false);
        }

        self.transition(WorkerState::Activated).await?;
        info!(generation = %self.generation, "Resumed activated generation");
        Ok(true)
    }

    /// Install, reporting each stored URL through `on_stored`
    pub async fn install_with_progress(
        &self,
        manifest: &Manifest,
        on_stored: &(dyn Fn(&Url) + Send + Sync),
    ) -> ShellCacheResult<InstallReport> {
        self.transition(WorkerState::Installing).await?;

        match self.populate(manifest, on_stored).await {
            Ok(report) => {
                self.force_state(WorkerState::Installed).await;
                info!(
                    generation = %report.generation,
                    entries = report.stored.len(),
                    bytes = report.bytes,
                    "Installed generation"
                );
                Ok(report)
            }
            Err(e) => {
                self.force_state(WorkerState::Redundant).await;
                warn!(generation = %self.generation, error = %e, "Install failed");
                Err(e)
            }
        }
    }

    async fn populate(
        &self,
        manifest: &Manifest,
        on_stored: &(dyn Fn(&Url) + Send + Sync),
    ) -> ShellCacheResult<InstallReport> {
        let resolved = manifest.resolve(&self.scope)?;

        // Fetch everything before writing anything
        let fetched = try_join_all(
            resolved
                .iter()
                .map(|(entry, url)| self.fetch_for_install(entry, url)),
        )
        .await?;

        let created = self.store.open(&self.generation).await.map_err(|e| {
            ShellCacheError::population(
                self.generation.as_str(),
                format!("opening generation: {}", e),
            )
        })?;

        let bytes: u64 = fetched.iter().map(|r| r.body.len() as u64).sum();
        let batch: Vec<(CacheKey, Response)> = resolved
            .iter()
            .zip(fetched)
            .map(|((_, url), response)| (CacheKey::from_url(url), response))
            .collect();

        if let Err(e) = self.store.put_all(&self.generation, batch).await {
            if created {
                if let Err(cleanup) = self.store.delete(&self.generation).await {
                    warn!(
                        generation = %self.generation,
                        error = %cleanup,
                        "Failed to remove partially populated generation"
                    );
                }
            }
            return Err(ShellCacheError::population(
                self.generation.as_str(),
                format!("storing responses: {}", e),
            ));
        }

        let stored: Vec<Url> = resolved.into_iter().map(|(_, url)| url).collect();
        for url in &stored {
            on_stored(url);
        }

        Ok(InstallReport {
            generation: self.generation.clone(),
            stored,
            bytes,
            created,
        })
    }

    async fn fetch_for_install(
        &self,
        entry: &ManifestEntry,
        url: &Url,
    ) -> ShellCacheResult<Response> {
        let request = Request::new(Method::Get, url.clone());
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| ShellCacheError::population(url.as_str(), e.to_string()))?;

        if !response.is_ok() {
            return Err(ShellCacheError::population(
                url.as_str(),
                format!("origin returned status {}", response.status),
            ));
        }

        entry
            .verify(&response.body)
            .map_err(|reason| ShellCacheError::population(url.as_str(), reason))?;

        debug!(url = %url, size = response.body.len(), "Fetched manifest entry");
        Ok(response)
    }

    async fn activate(&self, current: &GenerationId) -> ShellCacheResult<ActivateReport> {
        let existing = self.store.generations().await?;
        if !existing.contains(current) {
            return Err(ShellCacheError::GenerationNotInstalled(
                current.to_string(),
            ));
        }

        let mut evicted = Vec::new();
        let mut failed = Vec::new();

        for generation in existing.into_iter().filter(|g| g != current) {
            match self.store.delete(&generation).await {
                Ok(_) => {
                    info!(generation = %generation, "Evicted stale generation");
                    evicted.push(generation);
                }
                Err(e) => {
                    warn!(generation = %generation, error = %e, "Failed to evict stale generation");
                    failed.push((generation, e.to_string()));
                }
            }
        }

        self.store.set_active(current).await?;

        Ok(ActivateReport {
            retained: current.clone(),
            evicted,
            failed,
        })
    }

    /// Cache-then-network for an intercepted request
    async fn serve_from_generation(&self, request: &Request) -> ShellCacheResult<Served> {
        let key = request.cache_key();

        match self.store.lookup(&self.generation, &key).await {
            Ok(Some(response)) => {
                debug!(url = %key, "Cache hit");
                return Ok(Served {
                    response,
                    source: Source::Cache,
                });
            }
            Ok(None) => debug!(url = %key, "Cache miss"),
            Err(e) => warn!(url = %key, error = %e, "Cache lookup failed, using network"),
        }

        let response = self.network.fetch(request).await?;
        Ok(Served {
            response,
            source: Source::Network,
        })
    }
}

#[async_trait]
impl ServiceWorker for OfflineCacheManager {
    async fn on_install(&self, manifest: &Manifest) -> ShellCacheResult<InstallReport> {
        self.install_with_progress(manifest, &|_| {}).await
    }

    async fn on_activate(&self, current: &GenerationId) -> ShellCacheResult<ActivateReport> {
        let previous = self.state().await;
        let resuming = previous == WorkerState::Parsed;
        self.transition(WorkerState::Activating).await?;

        // A parsed worker may only activate a generation stored by an earlier run
        if resuming && current == &self.generation {
            let stored = match self.store.generations().await {
                Ok(stored) => stored,
                Err(e) => {
                    self.force_state(previous).await;
                    return Err(e);
                }
            };
            if !stored.contains(current) {
                self.force_state(previous).await;
                return Err(ShellCacheError::GenerationNotInstalled(
                    current.to_string(),
                ));
            }
        }

        match self.activate(current).await {
            Ok(report) => {
                let next = if current == &self.generation {
                    WorkerState::Activated
                } else {
                    WorkerState::Redundant
                };
                self.force_state(next).await;
                info!(
                    generation = %current,
                    evicted = report.evicted.len(),
                    failed = report.failed.len(),
                    "Activated generation"
                );
                Ok(report)
            }
            Err(e) => {
                self.force_state(previous).await;
                Err(e)
            }
        }
    }

    async fn on_fetch(&self, request: &Request) -> ShellCacheResult<Served> {
        if let Decision::Bypass { rule } = self.policy.evaluate(request) {
            debug!(method = %request.method, url = %request.url, rule = %rule, "Bypassing cache");
            let response = self.network.fetch(request).await?;
            return Ok(Served {
                response,
                source: Source::Bypass(rule),
            });
        }

        // Only GET is ever answered from a generation, whatever the rule table says
        if request.method != Method::Get {
            debug!(method = %request.method, url = %request.url, "Non-GET goes to network");
            let response = self.network.fetch(request).await?;
            return Ok(Served {
                response,
                source: Source::Bypass(NON_GET_RULE.to_string()),
            });
        }

        if !self.state().await.is_serving() {
            let response = self.network.fetch(request).await?;
            return Ok(Served {
                response,
                source: Source::Inactive,
            });
        }

        self.serve_from_generation(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parse_url;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Origin serving fixed bodies and counting calls
    #[derive(Default)]
    struct FakeOrigin {
        bodies: HashMap<String, (u16, &'static str)>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        offline: bool,
    }

    impl FakeOrigin {
        fn with(pages: &[(&str, u16, &'static str)]) -> Self {
            Self {
                bodies: pages
                    .iter()
                    .map(|(url, status, body)| (url.to_string(), (*status, *body)))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Network for FakeOrigin {
        async fn fetch(&self, request: &Request) -> ShellCacheResult<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(format!("{} {}", request.method, request.url));
            if self.offline {
                return Err(ShellCacheError::network(request.url.as_str(), "offline"));
            }
            let (status, body) = self
                .bodies
                .get(request.url.as_str())
                .copied()
                .unwrap_or((404, "not found"));
            Ok(Response::new(status, body))
        }
    }

    /// Store whose reads always fail
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn open(&self, _: &GenerationId) -> ShellCacheResult<bool> {
            Ok(true)
        }
        async fn put_all(
            &self,
            _: &GenerationId,
            _: Vec<(CacheKey, Response)>,
        ) -> ShellCacheResult<()> {
            Err(ShellCacheError::Lookup("disk full".into()))
        }
        async fn lookup(&self, _: &GenerationId, _: &CacheKey) -> ShellCacheResult<Option<Response>> {
            Err(ShellCacheError::Lookup("store unavailable".into()))
        }
        async fn entries(&self, _: &GenerationId) -> ShellCacheResult<Vec<CacheKey>> {
            Ok(Vec::new())
        }
        async fn generations(&self) -> ShellCacheResult<Vec<GenerationId>> {
            Ok(vec![gen("v1")])
        }
        async fn delete(&self, _: &GenerationId) -> ShellCacheResult<bool> {
            Ok(true)
        }
        async fn active(&self) -> ShellCacheResult<Option<GenerationId>> {
            Ok(Some(gen("v1")))
        }
        async fn set_active(&self, _: &GenerationId) -> ShellCacheResult<()> {
            Ok(())
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    /// Memory store that refuses to delete one generation
    struct StickyStore {
        inner: MemoryStore,
        sticky: GenerationId,
    }

    #[async_trait]
    impl CacheStore for StickyStore {
        async fn open(&self, g: &GenerationId) -> ShellCacheResult<bool> {
            self.inner.open(g).await
        }
        async fn put_all(
            &self,
            g: &GenerationId,
            e: Vec<(CacheKey, Response)>,
        ) -> ShellCacheResult<()> {
            self.inner.put_all(g, e).await
        }
        async fn lookup(&self, g: &GenerationId, k: &CacheKey) -> ShellCacheResult<Option<Response>> {
            self.inner.lookup(g, k).await
        }
        async fn entries(&self, g: &GenerationId) -> ShellCacheResult<Vec<CacheKey>> {
            self.inner.entries(g).await
        }
        async fn generations(&self) -> ShellCacheResult<Vec<GenerationId>> {
            self.inner.generations().await
        }
        async fn delete(&self, g: &GenerationId) -> ShellCacheResult<bool> {
            if g == &self.sticky {
                return Err(ShellCacheError::store_io(
                    "deleting",
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.inner.delete(g).await
        }
        async fn active(&self) -> ShellCacheResult<Option<GenerationId>> {
            self.inner.active().await
        }
        async fn set_active(&self, g: &GenerationId) -> ShellCacheResult<()> {
            self.inner.set_active(g).await
        }
        fn backend_name(&self) -> &'static str {
            "sticky"
        }
    }

    const SCOPE: &str = "https://versys.example/";

    fn gen(id: &str) -> GenerationId {
        GenerationId::new(id).unwrap()
    }

    fn shell_origin() -> Arc<FakeOrigin> {
        Arc::new(FakeOrigin::with(&[
            ("https://versys.example/", 200, "<html>shell</html>"),
            ("https://versys.example/app.css", 200, "body{}"),
            ("https://versys.example/missing.png", 200, "png"),
            ("https://versys.example/api/data", 201, "created"),
        ]))
    }

    fn manager(
        id: &str,
        store: Arc<dyn CacheStore>,
        origin: Arc<FakeOrigin>,
    ) -> OfflineCacheManager {
        OfflineCacheManager::new(
            gen(id),
            parse_url(SCOPE).unwrap(),
            BypassPolicy::default(),
            store,
            origin,
        )
    }

    fn shell_manifest() -> Manifest {
        Manifest::from_paths(["/", "/app.css"])
    }

    #[tokio::test]
    async fn end_to_end_install_fetch_activate() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();

        // Pre-existing stale generation
        store.open(&gen("v2")).await.unwrap();

        let worker = manager("v3", store.clone(), origin.clone());
        let report = worker.on_install(&shell_manifest()).await.unwrap();
        assert_eq!(report.stored.len(), 2);
        assert!(report.created);
        assert_eq!(worker.state().await, WorkerState::Installed);

        let activated = worker.on_activate(&gen("v3")).await.unwrap();
        assert_eq!(activated.evicted, vec![gen("v2")]);
        assert!(activated.is_complete());
        assert_eq!(store.generations().await.unwrap(), vec![gen("v3")]);

        let calls_after_install = origin.calls();

        let home = worker.on_fetch(&Request::get(SCOPE).unwrap()).await.unwrap();
        assert_eq!(home.source, Source::Cache);
        assert_eq!(home.response.body.as_ref(), b"<html>shell</html>");
        assert_eq!(origin.calls(), calls_after_install);

        let missing = worker
            .on_fetch(&Request::get("https://versys.example/missing.png").unwrap())
            .await
            .unwrap();
        assert_eq!(missing.source, Source::Network);
        assert_eq!(origin.calls(), calls_after_install + 1);

        let post = Request::new(Method::Post, parse_url("https://versys.example/api/data").unwrap());
        let posted = worker.on_fetch(&post).await.unwrap();
        assert_eq!(posted.source, Source::Bypass("non-get".to_string()));
        assert_eq!(posted.response.status, 201);
    }

    #[tokio::test]
    async fn manifest_entries_are_served_without_network() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        let worker = manager("v1", store, origin.clone());

        worker.on_install(&shell_manifest()).await.unwrap();
        worker.on_activate(&gen("v1")).await.unwrap();
        let before = origin.calls();

        for url in ["https://versys.example/", "https://versys.example/app.css"] {
            let served = worker.on_fetch(&Request::get(url).unwrap()).await.unwrap();
            assert_eq!(served.source, Source::Cache);
        }
        assert_eq!(origin.calls(), before);
    }

    #[tokio::test]
    async fn missing_manifest_entry_fails_whole_install() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        let worker = manager("v4", store.clone(), origin);

        let manifest = Manifest::from_paths(["/", "/app.css", "/stale-chunk.js"]);
        let err = worker.on_install(&manifest).await.unwrap_err();

        assert!(matches!(err, ShellCacheError::Population { ref url, .. } if url.ends_with("/stale-chunk.js")));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_origin_fails_install() {
        let store = Arc::new(MemoryStore::new());
        let origin = Arc::new(FakeOrigin {
            offline: true,
            ..Default::default()
        });
        let worker = manager("v1", store.clone(), origin);

        let err = worker.on_install(&shell_manifest()).await.unwrap_err();
        assert!(matches!(err, ShellCacheError::Population { .. }));
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn integrity_mismatch_fails_install() {
        let store = Arc::new(MemoryStore::new());
        let worker = manager("v1", store, shell_origin());

        let manifest = Manifest::new(vec![ManifestEntry::Pinned {
            path: "/app.css".to_string(),
            integrity: format!("sha256:{}", "0".repeat(64)),
        }]);
        let err = worker.on_install(&manifest).await.unwrap_err();
        assert!(err.to_string().contains("integrity mismatch"));
    }

    #[tokio::test]
    async fn storage_failure_during_install_is_population_failure() {
        let worker = manager("v1", Arc::new(BrokenStore), shell_origin());
        let err = worker.on_install(&shell_manifest()).await.unwrap_err();
        assert!(matches!(err, ShellCacheError::Population { .. }));
    }

    #[tokio::test]
    async fn install_twice_is_rejected() {
        let worker = manager("v1", Arc::new(MemoryStore::new()), shell_origin());
        worker.on_install(&shell_manifest()).await.unwrap();

        let err = worker.on_install(&shell_manifest()).await.unwrap_err();
        assert!(matches!(err, ShellCacheError::InvalidTransition { .. }));
        assert_eq!(worker.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn install_reports_progress_per_entry() {
        let worker = manager("v1", Arc::new(MemoryStore::new()), shell_origin());
        let seen = Mutex::new(Vec::new());

        worker
            .install_with_progress(&shell_manifest(), &|url| {
                seen.lock().unwrap().push(url.to_string())
            })
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["https://versys.example/", "https://versys.example/app.css"]
        );
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_to_network() {
        let origin = shell_origin();
        let worker = manager("v1", Arc::new(BrokenStore), origin.clone());
        assert!(worker.resume().await.unwrap());

        let served = worker.on_fetch(&Request::get(SCOPE).unwrap()).await.unwrap();
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.response.body.as_ref(), b"<html>shell</html>");
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn network_failure_on_miss_is_surfaced() {
        let store = Arc::new(MemoryStore::new());
        store.open(&gen("v1")).await.unwrap();
        store.set_active(&gen("v1")).await.unwrap();
        let origin = Arc::new(FakeOrigin {
            offline: true,
            ..Default::default()
        });
        let worker = manager("v1", store, origin);
        worker.resume().await.unwrap();

        let err = worker
            .on_fetch(&Request::get("https://versys.example/reports").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ShellCacheError::Network { .. }));
    }

    #[tokio::test]
    async fn third_party_storage_never_touches_store() {
        let origin = Arc::new(FakeOrigin::default());
        // BrokenStore fails every lookup; a bypass must not reach it
        let worker = manager("v1", Arc::new(BrokenStore), origin.clone());
        worker.resume().await.unwrap();

        for method in [Method::Get, Method::Put] {
            let request = Request::new(
                method,
                parse_url("https://firebasestorage.googleapis.com/v0/b/versys/o/a.pdf").unwrap(),
            );
            let served = worker.on_fetch(&request).await.unwrap();
            assert_eq!(served.source, Source::Bypass("third-party-storage".to_string()));
        }
        assert_eq!(origin.calls(), 2);
    }

    #[tokio::test]
    async fn non_get_never_reads_cache_even_when_url_is_cached() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        let worker = manager("v1", store, origin.clone());
        worker.on_install(&shell_manifest()).await.unwrap();
        worker.on_activate(&gen("v1")).await.unwrap();

        let request = Request::new(Method::Delete, parse_url(SCOPE).unwrap());
        let served = worker.on_fetch(&request).await.unwrap();
        assert_eq!(served.source, Source::Bypass("non-get".to_string()));
        assert!(origin
            .seen
            .lock()
            .unwrap()
            .contains(&"DELETE https://versys.example/".to_string()));
    }

    #[tokio::test]
    async fn custom_policy_cannot_serve_cached_get_to_post() {
        use crate::policy::{Matcher, PolicyRule};

        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        for policy in [
            BypassPolicy::new(vec![PolicyRule::bypass(
                "uploads",
                Matcher::PathContains(vec!["/uploads/".into()]),
            )]),
            BypassPolicy::empty(),
        ] {
            let worker = OfflineCacheManager::new(
                gen("v1"),
                parse_url(SCOPE).unwrap(),
                policy,
                store.clone(),
                origin.clone(),
            );
            worker.on_install(&shell_manifest()).await.unwrap();
            worker.on_activate(&gen("v1")).await.unwrap();

            let before = origin.calls();
            let post = Request::new(Method::Post, parse_url(SCOPE).unwrap());
            let served = worker.on_fetch(&post).await.unwrap();
            assert_ne!(served.source, Source::Cache);
            assert_eq!(served.source, Source::Bypass("non-get".to_string()));
            assert_eq!(origin.calls(), before + 1);

            // GET of the same URL still comes from the generation
            let get = worker.on_fetch(&Request::get(SCOPE).unwrap()).await.unwrap();
            assert_eq!(get.source, Source::Cache);
        }
    }

    #[tokio::test]
    async fn fetch_before_activation_passes_through() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        let worker = manager("v1", store, origin.clone());
        worker.on_install(&shell_manifest()).await.unwrap();
        let before = origin.calls();

        let served = worker.on_fetch(&Request::get(SCOPE).unwrap()).await.unwrap();
        assert_eq!(served.source, Source::Inactive);
        assert_eq!(origin.calls(), before + 1);
    }

    #[tokio::test]
    async fn activating_unknown_generation_deletes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.open(&gen("v1")).await.unwrap();
        store.open(&gen("v2")).await.unwrap();
        let worker = manager("v3", store.clone(), shell_origin());

        let err = worker.on_activate(&gen("v3")).await.unwrap_err();
        assert!(matches!(err, ShellCacheError::GenerationNotInstalled(_)));
        assert_eq!(store.generations().await.unwrap().len(), 2);
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn failed_eviction_is_reported_and_others_proceed() {
        let store = Arc::new(StickyStore {
            inner: MemoryStore::new(),
            sticky: gen("v1"),
        });
        store.open(&gen("v1")).await.unwrap();
        store.open(&gen("v2")).await.unwrap();

        let worker = manager("v3", store.clone(), shell_origin());
        worker.on_install(&shell_manifest()).await.unwrap();
        let report = worker.on_activate(&gen("v3")).await.unwrap();

        assert_eq!(report.evicted, vec![gen("v2")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, gen("v1"));
        assert!(!report.is_complete());
        assert_eq!(worker.state().await, WorkerState::Activated);
        assert_eq!(store.active().await.unwrap(), Some(gen("v3")));
    }

    #[tokio::test]
    async fn resume_from_earlier_activation() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();

        let first = manager("v1", store.clone(), origin.clone());
        first.on_install(&shell_manifest()).await.unwrap();
        first.on_activate(&gen("v1")).await.unwrap();

        let second = manager("v1", store.clone(), origin.clone());
        assert!(second.resume().await.unwrap());
        let served = second.on_fetch(&Request::get(SCOPE).unwrap()).await.unwrap();
        assert_eq!(served.source, Source::Cache);

        let other = manager("v2", store, origin);
        assert!(!other.resume().await.unwrap());
        assert_eq!(other.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn parsed_worker_activates_stored_generation() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        manager("v5", store.clone(), origin.clone())
            .on_install(&shell_manifest())
            .await
            .unwrap();
        store.open(&gen("v4")).await.unwrap();

        let fresh = manager("v5", store.clone(), origin);
        let report = fresh.on_activate(&gen("v5")).await.unwrap();
        assert_eq!(report.evicted, vec![gen("v4")]);
        assert_eq!(fresh.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn activating_another_generation_makes_worker_redundant() {
        let store = Arc::new(MemoryStore::new());
        let origin = shell_origin();
        let old = manager("v1", store.clone(), origin.clone());
        old.on_install(&shell_manifest()).await.unwrap();

        let new = manager("v2", store.clone(), origin);
        new.on_install(&shell_manifest()).await.unwrap();

        old.on_activate(&gen("v2")).await.unwrap();
        assert_eq!(old.state().await, WorkerState::Redundant);
        assert_eq!(store.generations().await.unwrap(), vec![gen("v2")]);
    }

    #[tokio::test]
    async fn independent_managers_do_not_share_generations() {
        let origin = shell_origin();
        let a = manager("v1", Arc::new(MemoryStore::new()), origin.clone());
        let b = manager("v1", Arc::new(MemoryStore::new()), origin);

        a.on_install(&shell_manifest()).await.unwrap();
        a.on_activate(&gen("v1")).await.unwrap();

        let err = b.on_activate(&gen("v1")).await.unwrap_err();
        assert!(matches!(err, ShellCacheError::GenerationNotInstalled(_)));
    }
}
