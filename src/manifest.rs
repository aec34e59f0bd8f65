//! Application-shell manifest
//!
//! The manifest lists the assets pre-fetched into a generation at install
//! time. Entries may pin a SHA-256 digest of the expected body; the digest
//! over all entries can also name the generation so that changing a pin
//! changes the generation.

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::generation::GenerationId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use url::Url;

/// Prefix for integrity pins
const INTEGRITY_PREFIX: &str = "sha256:";

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    /// Bare asset path
    Path(String),
    /// Asset path with a pinned body digest
    Pinned { path: String, integrity: String },
}

impl ManifestEntry {
    pub fn path(&self) -> &str {
        match self {
            Self::Path(path) | Self::Pinned { path, .. } => path.as_str(),
        }
    }

    pub fn integrity(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Pinned { integrity, .. } => Some(integrity.as_str()),
        }
    }

    /// Check a fetched body against the pin, if any
    pub fn verify(&self, body: &[u8]) -> Result<(), String> {
        let Some(expected) = self.integrity() else {
            return Ok(());
        };

        let expected = expected
            .strip_prefix(INTEGRITY_PREFIX)
            .ok_or_else(|| format!("unsupported integrity format '{}'", expected))?;
        let actual = hex::encode(Sha256::digest(body));

        if actual.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(format!(
                "integrity mismatch: expected {}{}, got {}{}",
                INTEGRITY_PREFIX, expected, INTEGRITY_PREFIX, actual
            ))
        }
    }
}

/// Ordered list of assets making up the application shell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Build from bare paths
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|p| ManifestEntry::Path(p.into()))
                .collect(),
        )
    }

    /// Load a JSON manifest (array of paths or `{path, integrity}` objects)
    pub async fn load(path: &Path) -> ShellCacheResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ShellCacheError::io(format!("reading manifest {}", path.display()), e))?;

        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            ShellCacheError::ManifestInvalid(format!("{}: {}", path.display(), e))
        })?;

        debug!(
            "Loaded manifest with {} entries from {}",
            manifest.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against the scope URL
    ///
    /// Fails on unparsable paths and on two entries naming the same URL.
    pub fn resolve(&self, scope: &Url) -> ShellCacheResult<Vec<(ManifestEntry, Url)>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let mut url = scope.join(entry.path()).map_err(|e| {
                ShellCacheError::ManifestInvalid(format!("'{}': {}", entry.path(), e))
            })?;
            url.set_fragment(None);

            if !seen.insert(url.clone()) {
                return Err(ShellCacheError::ManifestInvalid(format!(
                    "duplicate entry '{}'",
                    url
                )));
            }
            resolved.push((entry.clone(), url));
        }

        Ok(resolved)
    }

    /// SHA-256 over entry paths and pins, in order
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.path().as_bytes());
            hasher.update([0u8]);
            hasher.update(entry.integrity().unwrap_or_default().as_bytes());
            hasher.update([b'\n']);
        }
        hasher.finalize().into()
    }

    /// Derive a generation identifier from the manifest digest
    pub fn generation(&self, prefix: &str) -> ShellCacheResult<GenerationId> {
        GenerationId::from_digest(prefix, &self.digest())
    }
}
