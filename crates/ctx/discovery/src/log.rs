//! Discovery log: who was registered.
//!
//! The log survives restarts. Entries are not trusted on startup; the
//! mediator pings each logged component and reinstates only those that
//! answer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ctx_types::{ComponentDescription, ComponentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Current snapshot schema version.
pub const LOG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported log version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl From<LogError> for DiscoveryError {
    fn from(err: LogError) -> Self {
        DiscoveryError::Log(err.to_string())
    }
}

/// Persistent record of registrations.
#[async_trait]
pub trait DiscoveryLog: Send + Sync {
    /// Record (or overwrite) a registration.
    async fn record(&self, description: &ComponentDescription) -> DiscoveryResult<()>;

    /// Forget a registration. Unknown ids are ignored.
    async fn forget(&self, id: &ComponentId) -> DiscoveryResult<()>;

    /// Every logged registration.
    async fn load(&self) -> DiscoveryResult<Vec<ComponentDescription>>;
}

/// Log that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLog;

#[async_trait]
impl DiscoveryLog for NoopLog {
    async fn record(&self, _description: &ComponentDescription) -> DiscoveryResult<()> {
        Ok(())
    }

    async fn forget(&self, _id: &ComponentId) -> DiscoveryResult<()> {
        Ok(())
    }

    async fn load(&self) -> DiscoveryResult<Vec<ComponentDescription>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogSnapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    components: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    registered_at: DateTime<Utc>,
    description: ComponentDescription,
}

/// Log kept as a JSON snapshot, rewritten on every change.
pub struct FileDiscoveryLog {
    path: PathBuf,
    entries: Mutex<BTreeMap<ComponentId, LogEntry>>,
}

impl FileDiscoveryLog {
    /// Open the log at `path`, reading any existing snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> DiscoveryResult<Self> {
        let path = path.into();
        let entries = read_snapshot(&path).await?;
        debug!(path = %path.display(), entries = entries.len(), "Discovery log opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, entries: &BTreeMap<ComponentId, LogEntry>) -> Result<(), LogError> {
        let snapshot = LogSnapshot {
            version: LOG_VERSION,
            saved_at: Utc::now(),
            components: entries.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

async fn read_snapshot(path: &Path) -> Result<BTreeMap<ComponentId, LogEntry>, LogError> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    let snapshot: LogSnapshot = serde_json::from_str(&json)?;

    if snapshot.version > LOG_VERSION {
        return Err(LogError::UnsupportedVersion {
            found: snapshot.version,
            supported: LOG_VERSION,
        });
    }

    Ok(snapshot
        .components
        .into_iter()
        .map(|entry| (entry.description.id.clone(), entry))
        .collect())
}

#[async_trait]
impl DiscoveryLog for FileDiscoveryLog {
    async fn record(&self, description: &ComponentDescription) -> DiscoveryResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            description.id.clone(),
            LogEntry {
                registered_at: Utc::now(),
                description: description.clone(),
            },
        );
        self.save(&entries).await?;
        Ok(())
    }

    async fn forget(&self, id: &ComponentId) -> DiscoveryResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(id).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }

    async fn load(&self) -> DiscoveryResult<Vec<ComponentDescription>> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .map(|entry| entry.description.clone())
            .collect())
    }
}
