//! MemoryLedger - process-local ledger for dev runs and tests.

use super::{normalize_prefix, record_path, Ledger, TransactionRecord};
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<Uuid, TransactionRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.records.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.records.read().await.is_empty() }

    /// Every record, chronologically.
    pub async fn snapshot(&self) -> Vec<TransactionRecord> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        super::sort_chronologically(&mut all);
        all
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, record: &TransactionRecord) -> Result<Uuid, StorageError> {
        let mut guard = self.records.write().await;
        if guard.contains_key(&record.record_id) {
            return Err(StorageError::Duplicate(record.record_id));
        }
        guard.insert(record.record_id, record.clone());
        Ok(record.record_id)
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<TransactionRecord>, StorageError> {
        let prefix = normalize_prefix(prefix);
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| record_path(r.record_id).map(|p| p.starts_with(&prefix)).unwrap_or(false))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<TransactionRecord>, StorageError> {
        Ok(self.records.read().await.get(&record_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::core::{Amount, WalletAddress};

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let ledger = MemoryLedger::new();
        let addr = WalletAddress::parse("0x2222222222222222222222222222222222222222").unwrap();
        let r = TransactionRecord::new(&SystemClock, Uuid::new_v4(), addr, Amount::parse("3").unwrap(), "a.csv");
        ledger.append(&r).await.expect("append");
        assert!(matches!(ledger.append(&r).await, Err(StorageError::Duplicate(_))));
        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.list("", 10).await.unwrap().len(), 1);
        assert_eq!(ledger.get(r.record_id).await.unwrap(), Some(r));
    }
}
