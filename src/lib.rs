//! shellcache - offline application-shell cache
//!
//! Pre-fetches an application shell into an immutable cache generation,
//! retires stale generations on activation, and answers requests
//! cache-first with network fallback. Development-server traffic,
//! third-party storage and mutating requests bypass the cache.

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod http;
pub mod manifest;
pub mod network;
pub mod policy;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{ShellCacheError, ShellCacheResult};
pub use worker::{OfflineCacheManager, ServiceWorker};
