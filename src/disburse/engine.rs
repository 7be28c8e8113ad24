//! DisbursementEngine - payroll batch → per-entry gateway calls → ledger.
//!
//! Each instruction runs independently: a gateway failure becomes a
//! `failed` record and the batch moves on. Ledger write failures are logged
//! as operational faults and counted, never folded into the gateway outcome.
//!
//! Dispatch is bounded-concurrent; results land in a slot addressed by the
//! instruction's original index, so output order is parse order.

use super::payroll::{PayrollBatch, PayrollInstruction, PayrollParser};
use crate::clock::Clock;
use crate::core::paths::secrets as secret_names;
use crate::core::{Amount, WalletAddress};
use crate::error::{Result, StorageError, ValidationError};
use crate::gateway::{GatewayCredentials, GatewayError, GatewayErrorKind, Receipt, SigningGateway};
use crate::ledger::{Ledger, RecordStatus, TransactionRecord};
use crate::secrets::{self, SecretProvider};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Gateway calls in flight per batch, clamped to 1..=16.
    pub concurrency: usize,
    pub gateway_timeout: Duration,
    pub ledger_timeout: Duration,
    /// 1 = no retry. Only `ProviderUnavailable` is retried.
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            gateway_timeout: Duration::from_secs(10),
            ledger_timeout: Duration::from_secs(5),
            max_attempts: 1,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResult {
    pub wallet_address: WalletAddress,
    pub amount: Amount,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<GatewayErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// `None` when the ledger could not record this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub source_file_name: String,
    /// SHA-256 of the uploaded bytes, for audit correlation only.
    pub source_digest: String,
    pub total_entries: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub ledger_failures: usize,
    pub per_entry_results: Vec<EntryResult>,
}

pub struct DisbursementEngine {
    parser: Arc<dyn PayrollParser>,
    gateway: Arc<dyn SigningGateway>,
    ledger: Arc<dyn Ledger>,
    secrets: Arc<dyn SecretProvider>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl DisbursementEngine {
    pub fn new(
        parser: Arc<dyn PayrollParser>,
        gateway: Arc<dyn SigningGateway>,
        ledger: Arc<dyn Ledger>,
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self { parser, gateway, ledger, secrets, clock, config }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Parse only. Fails on empty bytes or any malformed entry.
    pub fn parse_batch(&self, file: &[u8], source_file_name: &str) -> std::result::Result<PayrollBatch, ValidationError> {
        if file.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        Ok(PayrollBatch {
            instructions: self.parser.parse(file)?,
            source_file_name: source_file_name.to_string(),
            received_at: self.clock.now(),
        })
    }

    pub async fn process_batch(&self, file: &[u8], source_file_name: &str) -> Result<BatchResult> {
        let batch = self.parse_batch(file, source_file_name)?;
        let batch_id = Uuid::new_v4();
        let source_digest = hex::encode(Sha256::digest(file));
        let total = batch.instructions.len();
        info!(%batch_id, file = %batch.source_file_name, entries = total, "batch received");

        if total == 0 {
            return Ok(BatchResult {
                batch_id,
                source_file_name: batch.source_file_name,
                source_digest,
                total_entries: 0,
                success_count: 0,
                failed_count: 0,
                ledger_failures: 0,
                per_entry_results: Vec::new(),
            });
        }

        let api_key = secrets::get_field(self.secrets.as_ref(), secret_names::SIGNING_GATEWAY, "apiKey").await?;
        let dispatch = Dispatch {
            batch_id,
            source_file_name: Arc::from(batch.source_file_name.as_str()),
            credentials: Arc::new(GatewayCredentials { api_key }),
            gateway: self.gateway.clone(),
            ledger: self.ledger.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        };

        // Entry futures own their inputs; none borrow from this call.
        let pending: Vec<_> = batch
            .instructions
            .into_iter()
            .enumerate()
            .map(|(idx, instruction)| {
                let dispatch = dispatch.clone();
                async move { (idx, dispatch.execute(instruction).await) }
            })
            .collect();
        let concurrency = self.config.concurrency.clamp(1, MAX_CONCURRENCY);
        let finished: Vec<(usize, EntryResult)> = stream::iter(pending).buffer_unordered(concurrency).collect().await;

        // One slot per instruction, written once by its own index.
        let mut slots: Vec<Option<EntryResult>> = vec![None; total];
        for (idx, entry) in finished {
            slots[idx] = Some(entry);
        }
        let per_entry_results: Vec<EntryResult> = slots.into_iter().flatten().collect();

        let success_count = per_entry_results.iter().filter(|r| r.status == RecordStatus::Success).count();
        let ledger_failures = per_entry_results.iter().filter(|r| r.record_id.is_none()).count();
        let result = BatchResult {
            batch_id,
            source_file_name: batch.source_file_name,
            source_digest,
            total_entries: total,
            success_count,
            failed_count: total - success_count,
            ledger_failures,
            per_entry_results,
        };
        info!(
            %batch_id,
            total = result.total_entries,
            success = result.success_count,
            failed = result.failed_count,
            ledger_failures = result.ledger_failures,
            "batch complete"
        );
        Ok(result)
    }
}

/// Per-batch dispatch context. Cloned into every entry future.
#[derive(Clone)]
struct Dispatch {
    batch_id: Uuid,
    source_file_name: Arc<str>,
    credentials: Arc<GatewayCredentials>,
    gateway: Arc<dyn SigningGateway>,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl Dispatch {
    async fn execute(self, instruction: PayrollInstruction) -> EntryResult {
        let batch_id = self.batch_id;
        let outcome = self.submit_with_retry(&instruction).await;

        let record = TransactionRecord::new(
            self.clock.as_ref(),
            batch_id,
            instruction.wallet_address.clone(),
            instruction.amount,
            &*self.source_file_name,
        );
        let record = match &outcome {
            Ok(receipt) => record.succeeded(receipt.provider_transaction_id.clone()),
            Err(e) => record.failed(e.kind, e.message.clone()),
        };

        let record_id = match self.append_record(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(
                    %batch_id,
                    record_id = %record.record_id,
                    wallet = %record.wallet_address,
                    status = ?record.status,
                    error = %e,
                    "ledger write failed"
                );
                None
            }
        };

        match outcome {
            Ok(receipt) => EntryResult {
                wallet_address: instruction.wallet_address,
                amount: instruction.amount,
                status: RecordStatus::Success,
                transaction_id: Some(receipt.provider_transaction_id),
                error_kind: None,
                error_message: None,
                record_id,
            },
            Err(e) => EntryResult {
                wallet_address: instruction.wallet_address,
                amount: instruction.amount,
                status: RecordStatus::Failed,
                transaction_id: None,
                error_kind: Some(e.kind),
                error_message: Some(e.message),
                record_id,
            },
        }
    }

    async fn submit_with_retry(&self, instruction: &PayrollInstruction) -> std::result::Result<Receipt, GatewayError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let call = self.gateway.submit(&instruction.wallet_address, instruction.amount, &self.credentials);
            let outcome = match tokio::time::timeout(self.config.gateway_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::timeout()),
            };
            match outcome {
                Ok(receipt) => {
                    debug!(wallet = %instruction.wallet_address, tx = %receipt.provider_transaction_id, "gateway accepted");
                    return Ok(receipt);
                }
                Err(e) if e.kind.is_retryable() && attempt < attempts => {
                    warn!(wallet = %instruction.wallet_address, attempt, kind = %e.kind, "gateway unavailable, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(wallet = %instruction.wallet_address, kind = %e.kind, "gateway rejected instruction");
                    return Err(e);
                }
            }
        }
    }

    async fn append_record(&self, record: &TransactionRecord) -> std::result::Result<Uuid, StorageError> {
        match tokio::time::timeout(self.config.ledger_timeout, self.ledger.append(record)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout),
        }
    }
}
