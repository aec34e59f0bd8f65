//! File-backed generation store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/.active                        last activated generation
//! <root>/<generation>/<digest>.body     response body
//! <root>/<generation>/<digest>.meta.json url, status, headers, stored_at
//! <root>/.staging-<generation>/         batch being written
//! ```
//!
//! A batch is written into the staging directory and renamed over the
//! generation once complete. Names starting with `.` are never valid
//! generation ids, so a crash leaves at most a dot-prefixed leftover that
//! listing ignores and the next write clears.

use super::CacheStore;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::generation::GenerationId;
use crate::http::{CacheKey, Response};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Name of the active-pointer file
const ACTIVE_FILE: &str = ".active";
const STAGING_PREFIX: &str = ".staging-";
const RETIRED_PREFIX: &str = ".retired-";

const BODY_EXT: &str = "body";
const META_SUFFIX: &str = ".meta.json";

/// Sidecar describing one stored response
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    url: CacheKey,
    status: u16,
    headers: Vec<(String, String)>,
    size: u64,
    stored_at: DateTime<Utc>,
}

/// Store keeping one directory per generation
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &GenerationId) -> PathBuf {
        self.root.join(generation.as_str())
    }

    fn sibling_dir(&self, prefix: &str, generation: &GenerationId) -> PathBuf {
        self.root.join(format!("{}{}", prefix, generation))
    }

    fn body_file(key: &CacheKey) -> String {
        format!("{}.{}", key.digest(), BODY_EXT)
    }

    fn meta_file(key: &CacheKey) -> String {
        format!("{}{}", key.digest(), META_SUFFIX)
    }

    fn body_path(&self, generation: &GenerationId, key: &CacheKey) -> PathBuf {
        self.generation_dir(generation).join(Self::body_file(key))
    }

    fn meta_path(&self, generation: &GenerationId, key: &CacheKey) -> PathBuf {
        self.generation_dir(generation).join(Self::meta_file(key))
    }

    async fn read_meta(path: &Path) -> ShellCacheResult<EntryMeta> {
        let raw = fs::read(path)
            .await
            .map_err(|e| ShellCacheError::store_io(format!("reading {}", path.display()), e))?;
        serde_json::from_slice(&raw).map_err(|e| ShellCacheError::StoreCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn write(path: &Path, contents: &[u8]) -> ShellCacheResult<()> {
        fs::write(path, contents)
            .await
            .map_err(|e| ShellCacheError::store_io(format!("writing {}", path.display()), e))
    }

    async fn remove_dir_if_exists(dir: &Path) -> ShellCacheResult<()> {
        match fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShellCacheError::store_io(
                format!("removing {}", dir.display()),
                e,
            )),
        }
    }

    /// Fill `staging` with the current generation's files plus `entries`
    async fn stage(
        &self,
        generation: &GenerationId,
        staging: &Path,
        entries: Vec<(CacheKey, Response)>,
    ) -> ShellCacheResult<()> {
        fs::create_dir_all(staging).await.map_err(|e| {
            ShellCacheError::store_io(format!("creating {}", staging.display()), e)
        })?;

        let dir = self.generation_dir(generation);
        match fs::read_dir(&dir).await {
            Ok(mut read_dir) => {
                while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
                    ShellCacheError::store_io(format!("listing {}", dir.display()), e)
                })? {
                    let from = entry.path();
                    fs::copy(&from, staging.join(entry.file_name()))
                        .await
                        .map_err(|e| {
                            ShellCacheError::store_io(format!("copying {}", from.display()), e)
                        })?;
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ShellCacheError::store_io(
                    format!("listing {}", dir.display()),
                    e,
                ))
            }
        }

        for (key, response) in entries {
            let meta = EntryMeta {
                url: key.clone(),
                status: response.status,
                headers: response.headers,
                size: response.body.len() as u64,
                stored_at: Utc::now(),
            };

            Self::write(&staging.join(Self::body_file(&key)), &response.body).await?;
            Self::write(
                &staging.join(Self::meta_file(&key)),
                &serde_json::to_vec_pretty(&meta)?,
            )
            .await?;
        }
        Ok(())
    }

    async fn rename(from: &Path, to: &Path) -> ShellCacheResult<()> {
        fs::rename(from, to).await.map_err(|e| {
            ShellCacheError::store_io(
                format!("renaming {} to {}", from.display(), to.display()),
                e,
            )
        })
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn open(&self, generation: &GenerationId) -> ShellCacheResult<bool> {
        let dir = self.generation_dir(generation);
        if fs::try_exists(&dir)
            .await
            .map_err(|e| ShellCacheError::store_io(format!("checking {}", dir.display()), e))?
        {
            return Ok(false);
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellCacheError::store_io(format!("creating {}", dir.display()), e))?;
        debug!(generation = %generation, path = %dir.display(), "Opened file generation");
        Ok(true)
    }

    async fn put_all(
        &self,
        generation: &GenerationId,
        entries: Vec<(CacheKey, Response)>,
    ) -> ShellCacheResult<()> {
        let staging = self.sibling_dir(STAGING_PREFIX, generation);
        let retired = self.sibling_dir(RETIRED_PREFIX, generation);
        Self::remove_dir_if_exists(&staging).await?;
        Self::remove_dir_if_exists(&retired).await?;

        let count = entries.len();
        if let Err(e) = self.stage(generation, &staging, entries).await {
            if let Err(cleanup) = Self::remove_dir_if_exists(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "Could not remove staging directory");
            }
            return Err(e);
        }

        let dir = self.generation_dir(generation);
        let existed = fs::try_exists(&dir)
            .await
            .map_err(|e| ShellCacheError::store_io(format!("checking {}", dir.display()), e))?;
        if existed {
            Self::rename(&dir, &retired).await?;
        }
        Self::rename(&staging, &dir).await?;
        Self::remove_dir_if_exists(&retired).await?;

        debug!(generation = %generation, entries = count, "Committed file generation");
        Ok(())
    }

    async fn lookup(
        &self,
        generation: &GenerationId,
        key: &CacheKey,
    ) -> ShellCacheResult<Option<Response>> {
        let meta_path = self.meta_path(generation, key);
        let meta = match Self::read_meta(&meta_path).await {
            Ok(meta) => meta,
            Err(ShellCacheError::StoreIo { source, .. }) if source.kind() == ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        if &meta.url != key {
            return Err(ShellCacheError::StoreCorrupt {
                path: meta_path,
                reason: format!("sidecar names {} instead of {}", meta.url, key),
            });
        }

        let body_path = self.body_path(generation, key);
        let body = fs::read(&body_path).await.map_err(|e| {
            ShellCacheError::store_io(format!("reading {}", body_path.display()), e)
        })?;

        Ok(Some(Response {
            status: meta.status,
            headers: meta.headers,
            body: Bytes::from(body),
        }))
    }

    async fn entries(&self, generation: &GenerationId) -> ShellCacheResult<Vec<CacheKey>> {
        let dir = self.generation_dir(generation);
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ShellCacheError::store_io(
                    format!("listing {}", dir.display()),
                    e,
                ))
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ShellCacheError::store_io(format!("listing {}", dir.display()), e))?
        {
            let path = entry.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_SUFFIX));
            if !is_meta {
                continue;
            }

            match Self::read_meta(&path).await {
                Ok(meta) => keys.push(meta.url),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn generations(&self) -> ShellCacheResult<Vec<GenerationId>> {
        let mut read_dir = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ShellCacheError::store_io(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut generations = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
            ShellCacheError::store_io(format!("listing {}", self.root.display()), e)
        })? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            // Directories that are not valid identifiers are not ours
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| GenerationId::new(name).ok())
            {
                generations.push(id);
            }
        }

        generations.sort();
        Ok(generations)
    }

    async fn delete(&self, generation: &GenerationId) -> ShellCacheResult<bool> {
        let dir = self.generation_dir(generation);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(ShellCacheError::store_io(
                    format!("deleting {}", dir.display()),
                    e,
                ))
            }
        }

        if self.active().await?.as_ref() == Some(generation) {
            let pointer = self.root.join(ACTIVE_FILE);
            fs::remove_file(&pointer).await.map_err(|e| {
                ShellCacheError::store_io(format!("removing {}", pointer.display()), e)
            })?;
        }

        debug!(generation = %generation, "Deleted file generation");
        Ok(true)
    }

    async fn active(&self) -> ShellCacheResult<Option<GenerationId>> {
        let pointer = self.root.join(ACTIVE_FILE);
        let raw = match fs::read_to_string(&pointer).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ShellCacheError::store_io(
                    format!("reading {}", pointer.display()),
                    e,
                ))
            }
        };

        GenerationId::new(raw.trim())
            .map(Some)
            .map_err(|e| ShellCacheError::StoreCorrupt {
                path: pointer,
                reason: e.to_string(),
            })
    }

    async fn set_active(&self, generation: &GenerationId) -> ShellCacheResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            ShellCacheError::store_io(format!("creating {}", self.root.display()), e)
        })?;
        Self::write(
            &self.root.join(ACTIVE_FILE),
            format!("{}\n", generation).as_bytes(),
        )
        .await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
