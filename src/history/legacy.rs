use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::dto::HistoryEntry;

/// Anonymous analysis history kept as one JSON array on disk.
///
/// Mutations are serialized by `lock` and land through a rename, so readers
/// never see a half-written file.
pub struct LegacyHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LegacyHistory {
    /// Creates the file as `[]` when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        if !path.exists() {
            write_atomic(&path, b"[]")?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Entries that cannot be read at all are skipped here but kept on disk.
    pub async fn list(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        let raw = self.load().await?;
        Ok(raw
            .iter()
            .filter_map(|v| {
                let entry = HistoryEntry::from_legacy(v);
                if entry.is_none() {
                    warn!(path = %self.path.display(), "skipping unreadable history entry");
                }
                entry
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> anyhow::Result<Option<HistoryEntry>> {
        let raw = self.load().await?;
        Ok(raw
            .iter()
            .find(|v| has_id(v, id))
            .and_then(HistoryEntry::from_legacy))
    }

    pub async fn append(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut raw = self.load().await?;
        raw.push(serde_json::to_value(&entry).context("serialize history entry")?);
        self.save(&raw).await
    }

    /// Removes and returns the entry, or `None` when the id is unknown.
    /// Other entries are written back exactly as they were read.
    pub async fn remove(&self, id: &str) -> anyhow::Result<Option<HistoryEntry>> {
        let _guard = self.lock.lock().await;
        let mut raw = self.load().await?;
        let Some(pos) = raw.iter().position(|v| has_id(v, id)) else {
            return Ok(None);
        };
        let removed = raw.remove(pos);
        self.save(&raw).await?;
        Ok(HistoryEntry::from_legacy(&removed))
    }

    async fn load(&self) -> anyhow::Result<Vec<Value>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", self.path.display())),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data).with_context(|| format!("parse {}", self.path.display()))
    }

    async fn save(&self, entries: &[Value]) -> anyhow::Result<()> {
        let data = serde_json::to_vec_pretty(entries).context("serialize history")?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .context("history write task")??;
        debug!(entries = entries.len(), "legacy history saved");
        Ok(())
    }
}

fn has_id(value: &Value, id: &str) -> bool {
    match value.get("id") {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).context("create temp history file")?;
    tmp.write_all(data).context("write temp history file")?;
    tmp.as_file().sync_all().context("sync temp history file")?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
