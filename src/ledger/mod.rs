//! Ledger - append-only audit log of transaction records
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `append(record)` | Durably writes one record, returns its id. Never overwrites. |
//! | `list(prefix, limit)` | Records whose relative path starts with `prefix`. Unordered. |
//! | `get(id)` | One record, for audit. |
//!
//! Records live under `transactions/<yyyy>/<mm>/<dd>/<recordId>.json`. The
//! date directories come from the timestamp embedded in the UUID v7 record
//! id, so a record's path is a pure function of its id.
//!
//! `list` makes no ordering promise. Callers sort by `createdAt`; clock
//! skew between records is tolerated.

mod file;
mod memory;

pub use file::FileLedger;
pub use memory::MemoryLedger;

use crate::clock::Clock;
use crate::core::paths::ledger as paths;
use crate::core::{Amount, WalletAddress};
use crate::error::StorageError;
use crate::gateway::GatewayErrorKind;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Failed,
}

/// One instruction outcome. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub record_id: Uuid,
    pub batch_id: Uuid,
    pub wallet_address: WalletAddress,
    pub amount: Amount,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<GatewayErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub source_file_name: String,
}

impl TransactionRecord {
    /// Fresh record with a new time-ordered id.
    pub fn new(
        clock: &dyn Clock,
        batch_id: Uuid,
        wallet_address: WalletAddress,
        amount: Amount,
        source_file_name: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Uuid::now_v7(),
            batch_id,
            wallet_address,
            amount,
            status: RecordStatus::Failed,
            provider_transaction_id: None,
            error_kind: None,
            error_reason: None,
            created_at: clock.now(),
            source_file_name: source_file_name.into(),
        }
    }

    pub fn succeeded(mut self, provider_transaction_id: impl Into<String>) -> Self {
        self.status = RecordStatus::Success;
        self.provider_transaction_id = Some(provider_transaction_id.into());
        self
    }

    pub fn failed(mut self, kind: GatewayErrorKind, reason: impl Into<String>) -> Self {
        self.status = RecordStatus::Failed;
        self.error_kind = Some(kind);
        self.error_reason = Some(reason.into());
        self
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append(&self, record: &TransactionRecord) -> Result<Uuid, StorageError>;
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<TransactionRecord>, StorageError>;
    async fn get(&self, record_id: Uuid) -> Result<Option<TransactionRecord>, StorageError>;
}

/// `<yyyy>/<mm>/<dd>/<id>.json` relative to the namespace, or `None` for
/// ids without an embedded timestamp.
pub fn record_path(record_id: Uuid) -> Option<String> {
    let (secs, nanos) = record_id.get_timestamp()?.to_unix();
    let at = DateTime::<Utc>::from_timestamp(i64::try_from(secs).ok()?, nanos)?;
    Some(format!("{:04}/{:02}/{:02}/{}.{}", at.year(), at.month(), at.day(), record_id, paths::RECORD_EXT))
}

/// Normalize a caller-supplied list prefix: no leading slash, no namespace.
pub fn normalize_prefix(prefix: &str) -> String {
    let p = prefix.trim().trim_start_matches('/');
    let p = p.strip_prefix(paths::NAMESPACE).unwrap_or(p);
    p.trim_start_matches('/').to_string()
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(paths::DEFAULT_LIST_LIMIT).clamp(1, paths::MAX_LIST_LIMIT)
}

/// Chronological order for callers that need it.
pub fn sort_chronologically(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.record_id.cmp(&b.record_id)));
}
