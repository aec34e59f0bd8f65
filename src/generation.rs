//! Cache generations and worker lifecycle state
//!
//! A generation is one immutable snapshot of the application shell, named
//! by a version string. Exactly one generation is current; every other
//! stored generation is stale and is evicted on activation.
//!
//! # Worker States
//!
//! | State | Description |
//! |-------|-------------|
//! | Parsed | Constructed, nothing stored yet |
//! | Installing | Manifest population in progress |
//! | Installed | Generation fully populated, waiting for activation |
//! | Activating | Evicting stale generations |
//! | Activated | Serving fetches from the generation |
//! | Redundant | Install failed or superseded by another generation |

use crate::error::{ShellCacheError, ShellCacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum identifier length; identifiers double as directory names
const MAX_GENERATION_LEN: usize = 64;

/// Identifier of one cache generation (e.g. `v3`, `shell-1a2b3c4d5e6f`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationId(String);

impl GenerationId {
    /// Validate and wrap an identifier
    pub fn new(id: impl Into<String>) -> ShellCacheResult<Self> {
        let id = id.into();
        let invalid = |reason: &str| ShellCacheError::InvalidGeneration {
            id: id.clone(),
            reason: reason.to_string(),
        };

        if id.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if id.len() > MAX_GENERATION_LEN {
            return Err(invalid("must be at most 64 characters"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(invalid("only letters, digits, '.', '_' and '-' are allowed"));
        }
        if id.starts_with('.') {
            return Err(invalid("must not start with '.'"));
        }

        Ok(Self(id))
    }

    /// Build `<prefix>-<hash>` from a content digest (first 12 hex chars)
    pub fn from_digest(prefix: &str, digest: &[u8]) -> ShellCacheResult<Self> {
        let hash = hex::encode(&digest[..digest.len().min(6)]);
        Self::new(format!("{}-{}", prefix, hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GenerationId {
    type Err = ShellCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GenerationId {
    type Error = ShellCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GenerationId> for String {
    fn from(id: GenerationId) -> Self {
        id.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Parsed, Activating)
                | (Activated, Activating)
                | (Activating, Activated)
                | (Activating, Redundant)
                | (Parsed, Activated)
        )
    }

    /// Whether fetches are served from the generation
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Activated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
