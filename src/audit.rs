//! Audit journal for generation lifecycle events
//!
//! Writes JSON lines to `<data dir>/shellcache/audit.log`. A failed write is
//! logged and dropped; it never fails the command that produced the event.

use crate::config::{schema::Config, ConfigManager};
use crate::generation::GenerationId;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Lifecycle events recorded in the journal
#[derive(Debug, Clone)]
pub enum AuditEvent<'a> {
    Installed {
        generation: &'a GenerationId,
        entries: usize,
        bytes: u64,
    },
    InstallFailed {
        generation: &'a GenerationId,
        reason: String,
    },
    Activated {
        generation: &'a GenerationId,
        evicted: &'a [GenerationId],
    },
    EvictFailed {
        generation: &'a GenerationId,
        reason: &'a str,
    },
    Cleared {
        removed: &'a [GenerationId],
    },
}

impl AuditEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Installed { .. } => "generation.installed",
            Self::InstallFailed { .. } => "generation.install_failed",
            Self::Activated { .. } => "generation.activated",
            Self::EvictFailed { .. } => "generation.evict_failed",
            Self::Cleared { .. } => "generations.cleared",
        }
    }

    fn data(&self) -> serde_json::Value {
        match self {
            Self::Installed {
                generation,
                entries,
                bytes,
            } => json!({ "generation": generation, "entries": entries, "bytes": bytes }),
            Self::InstallFailed { generation, reason } => {
                json!({ "generation": generation, "reason": reason })
            }
            Self::Activated {
                generation,
                evicted,
            } => json!({ "generation": generation, "evicted": evicted }),
            Self::EvictFailed { generation, reason } => {
                json!({ "generation": generation, "reason": reason })
            }
            Self::Cleared { removed } => json!({ "removed": removed }),
        }
    }
}

/// File-based audit logger that appends JSON lines
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create a new audit logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    /// Record an event as a JSON line
    pub async fn record(&self, event: AuditEvent<'_>) {
        if !self.enabled {
            return;
        }

        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event.name(),
            "data": event.data(),
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit log: {}", e);
        }
    }

    /// Most recent entry, if the journal exists and is readable
    pub async fn last_entry(&self) -> Option<serde_json::Value> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        content
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str(line).ok())
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
