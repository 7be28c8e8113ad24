//! FileLedger - durable filesystem ledger
//!
//! append: write `<id>.json.tmp` → fsync → rename to `<id>.json`.
//! A record is visible only once it is fully on disk.

use super::{record_path, Ledger, TransactionRecord};
use crate::core::paths::ledger as paths;
use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct FileLedger {
    root: PathBuf,
}

impl FileLedger {
    pub async fn open(base: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = base.as_ref().join(paths::NAMESPACE);
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::Unavailable(format!("create {}: {e}", root.display())))?;
        info!(root = %root.display(), "ledger opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    async fn read_record(&self, path: &Path) -> Result<TransactionRecord, StorageError> {
        let raw = fs::read(path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Corrupt { path: path.display().to_string(), reason: e.to_string() })
    }

    /// Relative `/`-joined path of a file under the namespace root.
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
            .unwrap_or_default()
    }
}

/// Flush directory entries so a committed rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    let handle = fs::File::open(dir)
        .await
        .map_err(|e| StorageError::Unavailable(format!("open {}: {e}", dir.display())))?;
    handle
        .sync_all()
        .await
        .map_err(|e| StorageError::Unavailable(format!("sync {}: {e}", dir.display())))
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StorageError> { Ok(()) }

#[async_trait]
impl Ledger for FileLedger {
    async fn append(&self, record: &TransactionRecord) -> Result<Uuid, StorageError> {
        let rel = record_path(record.record_id)
            .ok_or_else(|| StorageError::Unavailable(format!("record id {} carries no timestamp", record.record_id)))?;
        let path = self.root.join(&rel);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Unavailable(format!("create {}: {e}", dir.display())))?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::Duplicate(record.record_id));
        }

        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| StorageError::Unavailable(format!("encode record: {e}")))?;
        let tmp = path.with_extension(paths::TEMP_EXT);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await
            .map_err(|e| StorageError::Unavailable(format!("open {}: {e}", tmp.display())))?;
        let written = async {
            file.write_all(&body).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::Unavailable(format!("write {}: {e}", tmp.display())));
        }
        drop(file);

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("commit {}: {e}", path.display())))?;
        sync_dir(&dir).await?;
        debug!(record_id = %record.record_id, path = %rel, "record appended");
        Ok(record.record_id)
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<TransactionRecord>, StorageError> {
        let prefix = super::normalize_prefix(prefix);
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::Unavailable(format!("list {}: {e}", dir.display())))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::Unavailable(format!("list {}: {e}", dir.display())))?
            {
                let path = entry.path();
                let rel = self.relative(&path);
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::Unavailable(format!("stat {}: {e}", path.display())))?;
                if file_type.is_dir() {
                    // Descend only where the prefix can still match.
                    if rel.starts_with(&prefix) || prefix.starts_with(&rel) {
                        stack.push(path);
                    }
                    continue;
                }
                let is_record = path.extension().map(|e| e == paths::RECORD_EXT).unwrap_or(false);
                if !is_record || !rel.starts_with(&prefix) {
                    continue;
                }
                match self.read_record(&path).await {
                    Ok(record) => out.push(record),
                    Err(StorageError::Corrupt { path, reason }) => warn!(%path, %reason, "skipping corrupt record"),
                    Err(e) => return Err(e),
                }
                if out.len() >= limit {
                    return Ok(out);
                }
            }
        }
        Ok(out)
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<TransactionRecord>, StorageError> {
        let Some(rel) = record_path(record_id) else { return Ok(None) };
        let path = self.root.join(rel);
        if !fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("stat {}: {e}", path.display())))?
        {
            return Ok(None);
        }
        self.read_record(&path).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::core::{Amount, WalletAddress};
    use crate::ledger::RecordStatus;
    use tempfile::TempDir;

    fn record(n: u8) -> TransactionRecord {
        let addr = WalletAddress::parse(&format!("0x{}", hex::encode([n; 20]))).unwrap();
        TransactionRecord::new(&SystemClock, Uuid::new_v4(), addr, Amount::parse("10").unwrap(), "payroll.csv")
            .succeeded(format!("tx-{n}"))
    }

    #[tokio::test]
    async fn append_then_get() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = FileLedger::open(dir.path()).await.expect("ledger");
        let r = record(1);
        let id = ledger.append(&r).await.expect("append");
        assert_eq!(id, r.record_id);

        let back = ledger.get(id).await.expect("get").expect("present");
        assert_eq!(back, r);
        assert_eq!(back.status, RecordStatus::Success);
        assert!(ledger.get(Uuid::now_v7()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn directory_sync() {
        let dir = TempDir::new().expect("tempdir");
        sync_dir(dir.path()).await.expect("sync existing dir");
        #[cfg(unix)]
        assert!(matches!(sync_dir(&dir.path().join("missing")).await, Err(StorageError::Unavailable(_))));

        // The record and its day directory are both in place after append returns.
        let ledger = FileLedger::open(dir.path()).await.expect("ledger");
        let r = record(3);
        ledger.append(&r).await.expect("append");
        let path = ledger.root().join(record_path(r.record_id).expect("path"));
        assert!(path.is_file());
        assert!(!path.with_extension(paths::TEMP_EXT).exists());
    }

    #[tokio::test]
    async fn append_never_overwrites() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = FileLedger::open(dir.path()).await.expect("ledger");
        let r = record(2);
        ledger.append(&r).await.expect("first append");
        let again = ledger.append(&r).await;
        assert!(matches!(again, Err(StorageError::Duplicate(id)) if id == r.record_id));
    }

    #[tokio::test]
    async fn list_filters_by_prefix_and_limit() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = FileLedger::open(dir.path()).await.expect("ledger");
        for n in 0..5 {
            ledger.append(&record(n)).await.expect("append");
        }

        assert_eq!(ledger.list("", 100).await.expect("list").len(), 5);
        assert_eq!(ledger.list("", 3).await.expect("list").len(), 3);

        let year = chrono::Utc::now().format("%Y").to_string();
        assert_eq!(ledger.list(&format!("/transactions/{year}"), 100).await.expect("list").len(), 5);
        assert!(ledger.list("1999", 100).await.expect("list").is_empty());

        // No stray temp files once appends return.
        let mut stack = vec![ledger.root().to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(d).unwrap().flatten() {
                let p = entry.path();
                if p.is_dir() { stack.push(p); } else { assert!(!p.to_string_lossy().ends_with(".tmp")); }
            }
        }
    }

    #[tokio::test]
    async fn corrupt_records_are_skipped_in_listing() {
        let dir = TempDir::new().expect("tempdir");
        let ledger = FileLedger::open(dir.path()).await.expect("ledger");
        ledger.append(&record(9)).await.expect("append");
        std::fs::write(ledger.root().join("garbage.json"), b"{not json").unwrap();
        assert_eq!(ledger.list("", 100).await.expect("list").len(), 1);
    }
}
