//! Integration Tests: payroll batch disbursement
//!
//! These tests verify:
//! 1. Per-entry isolation of gateway failures
//! 2. Output order under concurrent dispatch
//! 3. Ledger faults never fail the batch
//! 4. Retry and timeout semantics
//! 5. Whole-request failures (validation, missing credentials)

use async_trait::async_trait;
use paynode::clock::{Clock, ManualClock};
use paynode::core::paths::secrets as secret_names;
use paynode::disburse::{AutoPayrollParser, DisbursementEngine, EngineConfig};
use paynode::error::{Error, SecretError, StorageError, ValidationError};
use paynode::gateway::{GatewayCredentials, GatewayError, GatewayErrorKind, Receipt, SigningGateway};
use paynode::ledger::{Ledger, MemoryLedger, RecordStatus, TransactionRecord};
use paynode::secrets::StaticSecretProvider;
use paynode::{Amount, WalletAddress};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

fn addr(n: u64) -> String { format!("0x{n:040x}") }

#[derive(Clone)]
enum Step {
    Accept,
    Reject(GatewayErrorKind),
}

#[derive(Clone)]
struct Script {
    delay: Duration,
    /// Consumed front to back; the last step repeats.
    steps: Vec<Step>,
}

impl Script {
    fn accept() -> Self { Self { delay: Duration::ZERO, steps: vec![Step::Accept] } }
    fn reject(kind: GatewayErrorKind) -> Self { Self { delay: Duration::ZERO, steps: vec![Step::Reject(kind)] } }
    fn delayed(mut self, delay: Duration) -> Self { self.delay = delay; self }
    fn then(mut self, step: Step) -> Self { self.steps.push(step); self }
}

/// Gateway fake keyed by wallet address. Unscripted addresses are accepted.
#[derive(Default)]
struct ScriptedGateway {
    scripts: HashMap<String, Script>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen_keys: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn with(mut self, address: &str, script: Script) -> Self {
        self.scripts.insert(address.to_string(), script);
        self
    }
    fn calls_for(&self, address: &str) -> usize {
        self.calls.lock().unwrap().get(address).copied().unwrap_or(0)
    }
    fn total_calls(&self) -> usize { self.calls.lock().unwrap().values().sum() }
}

#[async_trait]
impl SigningGateway for ScriptedGateway {
    async fn submit(
        &self,
        wallet_address: &WalletAddress,
        amount: Amount,
        credentials: &GatewayCredentials,
    ) -> Result<Receipt, GatewayError> {
        let key = wallet_address.to_string();
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(key.clone()).or_insert(0);
            *n += 1;
            *n
        };
        self.seen_keys.lock().unwrap().push(credentials.api_key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let script = self.scripts.get(&key).cloned().unwrap_or_else(Script::accept);
        tokio::time::sleep(script.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let step = script.steps.get(attempt - 1).or(script.steps.last()).cloned().unwrap_or(Step::Accept);
        match step {
            Step::Accept => Ok(Receipt { provider_transaction_id: format!("tx-{key}-{amount}"), status: "submitted".into() }),
            Step::Reject(kind) => Err(GatewayError::new(kind, format!("scripted {kind}"))),
        }
    }
}

/// Ledger that cannot write.
struct BrokenLedger;

#[async_trait]
impl Ledger for BrokenLedger {
    async fn append(&self, _record: &TransactionRecord) -> Result<Uuid, StorageError> {
        Err(StorageError::Unavailable("disk gone".into()))
    }
    async fn list(&self, _prefix: &str, _limit: usize) -> Result<Vec<TransactionRecord>, StorageError> { Ok(Vec::new()) }
    async fn get(&self, _id: Uuid) -> Result<Option<TransactionRecord>, StorageError> { Ok(None) }
}

/// Ledger that never answers in time.
struct StalledLedger;

#[async_trait]
impl Ledger for StalledLedger {
    async fn append(&self, record: &TransactionRecord) -> Result<Uuid, StorageError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(record.record_id)
    }
    async fn list(&self, _prefix: &str, _limit: usize) -> Result<Vec<TransactionRecord>, StorageError> { Ok(Vec::new()) }
    async fn get(&self, _id: Uuid) -> Result<Option<TransactionRecord>, StorageError> { Ok(None) }
}

fn secrets() -> Arc<StaticSecretProvider> {
    Arc::new(StaticSecretProvider::new().with(secret_names::SIGNING_GATEWAY, json!({"apiKey": "test-key"})))
}

fn engine(gateway: Arc<ScriptedGateway>, ledger: Arc<dyn Ledger>, config: EngineConfig) -> DisbursementEngine {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
    DisbursementEngine::new(Arc::new(AutoPayrollParser), gateway, ledger, secrets(), clock, config)
}

fn csv(rows: &[(String, &str)]) -> Vec<u8> {
    let mut out = String::from("walletAddress,amount\n");
    for (a, m) in rows {
        out.push_str(&format!("{a},{m}\n"));
    }
    out.into_bytes()
}

/// Test: one accepted and one timed-out entry, both recorded
#[tokio::test]
async fn mixed_batch_records_both_outcomes() {
    let (a, b) = (addr(0xA), addr(0xB));
    let gateway = Arc::new(ScriptedGateway::default().with(&b, Script::accept().delayed(Duration::from_secs(3))));
    let ledger = Arc::new(MemoryLedger::new());
    let config = EngineConfig { gateway_timeout: Duration::from_millis(100), ..Default::default() };
    let engine = engine(gateway.clone(), ledger.clone(), config);

    let result = engine
        .process_batch(&csv(&[(a.clone(), "100.50"), (b.clone(), "250.75")]), "october.csv")
        .await
        .expect("batch");

    assert_eq!(result.total_entries, 2);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.ledger_failures, 0);
    assert_eq!(result.source_file_name, "october.csv");

    let first = &result.per_entry_results[0];
    assert_eq!(first.wallet_address.as_str(), a);
    assert_eq!(first.amount, Amount::parse("100.50").unwrap());
    assert_eq!(first.status, RecordStatus::Success);
    assert!(first.transaction_id.is_some());

    let second = &result.per_entry_results[1];
    assert_eq!(second.status, RecordStatus::Failed);
    assert_eq!(second.error_kind, Some(GatewayErrorKind::Timeout));

    let records = ledger.snapshot().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.batch_id == result.batch_id && r.source_file_name == "october.csv"));
    let failed = records.iter().find(|r| r.status == RecordStatus::Failed).expect("failed record");
    assert_eq!(failed.wallet_address.as_str(), b);
    assert_eq!(failed.error_kind, Some(GatewayErrorKind::Timeout));
    assert!(failed.provider_transaction_id.is_none());

    assert_eq!(gateway.seen_keys.lock().unwrap().as_slice(), ["test-key", "test-key"]);
}

/// Test: a batch can run on a spawned task, as the HTTP handler does
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_runs_on_spawned_task() {
    let gateway = Arc::new(ScriptedGateway::default());
    let engine = Arc::new(engine(gateway.clone(), Arc::new(MemoryLedger::new()), EngineConfig::default()));
    let file = csv(&[(addr(1), "1.5"), (addr(2), "2.5"), (addr(3), "3.5")]);

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.process_batch(&file, "spawned.csv").await }
    });
    let result = task.await.expect("join").expect("batch");
    assert_eq!(result.success_count, 3);
    assert_eq!(result.per_entry_results[2].amount, Amount::parse("3.5").unwrap());
    assert_eq!(gateway.total_calls(), 3);
}

/// Test: a rejected entry does not affect its neighbours
#[tokio::test]
async fn failures_are_isolated() {
    let bad = addr(2);
    let gateway = Arc::new(ScriptedGateway::default().with(&bad, Script::reject(GatewayErrorKind::InvalidInstruction)));
    let ledger = Arc::new(MemoryLedger::new());
    let engine = engine(gateway.clone(), ledger.clone(), EngineConfig::default());

    let rows: Vec<(String, &str)> = (1..=5).map(|n| (addr(n), "1")).collect();
    let result = engine.process_batch(&csv(&rows), "p.csv").await.expect("batch");

    assert_eq!(result.success_count, 4);
    assert_eq!(result.failed_count, 1);
    let statuses: Vec<RecordStatus> = result.per_entry_results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [RecordStatus::Success, RecordStatus::Failed, RecordStatus::Success, RecordStatus::Success, RecordStatus::Success]
    );
    assert_eq!(result.per_entry_results[1].error_kind, Some(GatewayErrorKind::InvalidInstruction));
    assert_eq!(ledger.len().await, 5);
}

/// Test: results keep parse order even when later entries finish first
#[tokio::test]
async fn output_order_matches_input_order() {
    let mut gateway = ScriptedGateway::default();
    let rows: Vec<(String, &str)> = (1..=8).map(|n| (addr(n), "2.5")).collect();
    for (i, (a, _)) in rows.iter().enumerate() {
        // First entry is slowest.
        gateway = gateway.with(a, Script::accept().delayed(Duration::from_millis(20 * (8 - i as u64))));
    }
    let gateway = Arc::new(gateway);
    let engine = engine(gateway.clone(), Arc::new(MemoryLedger::new()), EngineConfig { concurrency: 8, ..Default::default() });

    let result = engine.process_batch(&csv(&rows), "p.csv").await.expect("batch");
    let got: Vec<String> = result.per_entry_results.iter().map(|r| r.wallet_address.to_string()).collect();
    let want: Vec<String> = rows.iter().map(|(a, _)| a.clone()).collect();
    assert_eq!(got, want);
}

/// Test: never more calls in flight than the configured bound
#[tokio::test]
async fn concurrency_is_bounded() {
    let mut gateway = ScriptedGateway::default();
    let rows: Vec<(String, &str)> = (1..=12).map(|n| (addr(n), "1")).collect();
    for (a, _) in &rows {
        gateway = gateway.with(a, Script::accept().delayed(Duration::from_millis(30)));
    }
    let gateway = Arc::new(gateway);
    let engine = engine(gateway.clone(), Arc::new(MemoryLedger::new()), EngineConfig { concurrency: 3, ..Default::default() });

    let result = engine.process_batch(&csv(&rows), "p.csv").await.expect("batch");
    assert_eq!(result.success_count, 12);
    let peak = gateway.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak {peak}");
    assert!(peak >= 1);
}

/// Test: ledger outage is counted, entry status still reflects the gateway
#[tokio::test]
async fn ledger_failure_does_not_fail_batch() {
    let gateway = Arc::new(ScriptedGateway::default());
    let engine = engine(gateway.clone(), Arc::new(BrokenLedger), EngineConfig::default());

    let rows = vec![(addr(1), "10"), (addr(2), "20")];
    let result = engine.process_batch(&csv(&rows), "p.csv").await.expect("batch completes");

    assert_eq!(result.success_count, 2);
    assert_eq!(result.ledger_failures, 2);
    assert!(result.per_entry_results.iter().all(|r| r.status == RecordStatus::Success && r.record_id.is_none()));
}

/// Test: a stalled ledger times out the same way
#[tokio::test]
async fn ledger_timeout_is_a_ledger_failure() {
    let gateway = Arc::new(ScriptedGateway::default());
    let config = EngineConfig { ledger_timeout: Duration::from_millis(50), ..Default::default() };
    let engine = engine(gateway, Arc::new(StalledLedger), config);

    let result = engine.process_batch(&csv(&[(addr(1), "1")]), "p.csv").await.expect("batch");
    assert_eq!(result.success_count, 1);
    assert_eq!(result.ledger_failures, 1);
}

/// Test: re-uploading the same file creates a new batch and new records
#[tokio::test]
async fn rerun_produces_disjoint_records() {
    let gateway = Arc::new(ScriptedGateway::default());
    let ledger = Arc::new(MemoryLedger::new());
    let engine = engine(gateway.clone(), ledger.clone(), EngineConfig::default());
    let file = csv(&[(addr(1), "1"), (addr(2), "2")]);

    let first = engine.process_batch(&file, "p.csv").await.expect("first");
    let second = engine.process_batch(&file, "p.csv").await.expect("second");

    assert_ne!(first.batch_id, second.batch_id);
    assert_eq!(first.source_digest, second.source_digest);
    let ids: HashSet<Uuid> = first
        .per_entry_results
        .iter()
        .chain(second.per_entry_results.iter())
        .filter_map(|r| r.record_id)
        .collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(ledger.len().await, 4);
    assert_eq!(gateway.total_calls(), 4);
}

/// Test: only ProviderUnavailable is retried, and only when configured
#[tokio::test]
async fn retry_semantics() {
    let flaky = addr(1);
    let slow = addr(2);
    let denied = addr(3);
    let script = Script::reject(GatewayErrorKind::ProviderUnavailable)
        .then(Step::Reject(GatewayErrorKind::ProviderUnavailable))
        .then(Step::Accept);

    // Default: single attempt.
    let gateway = Arc::new(ScriptedGateway::default().with(&flaky, script.clone()));
    let engine_once = engine(gateway.clone(), Arc::new(MemoryLedger::new()), EngineConfig::default());
    let result = engine_once.process_batch(&csv(&[(flaky.clone(), "1")]), "p.csv").await.expect("batch");
    assert_eq!(result.per_entry_results[0].error_kind, Some(GatewayErrorKind::ProviderUnavailable));
    assert_eq!(gateway.calls_for(&flaky), 1);

    let gateway = Arc::new(
        ScriptedGateway::default()
            .with(&flaky, script)
            .with(&slow, Script::accept().delayed(Duration::from_secs(3)))
            .with(&denied, Script::reject(GatewayErrorKind::AuthenticationFailed)),
    );
    let config = EngineConfig {
        max_attempts: 3,
        retry_backoff: Duration::from_millis(5),
        gateway_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let engine_retry = engine(gateway.clone(), Arc::new(MemoryLedger::new()), config);
    let rows = vec![(flaky.clone(), "1"), (slow.clone(), "1"), (denied.clone(), "1")];
    let result = engine_retry.process_batch(&csv(&rows), "p.csv").await.expect("batch");

    assert_eq!(result.per_entry_results[0].status, RecordStatus::Success);
    assert_eq!(gateway.calls_for(&flaky), 3);
    assert_eq!(result.per_entry_results[1].error_kind, Some(GatewayErrorKind::Timeout));
    assert_eq!(gateway.calls_for(&slow), 1);
    assert_eq!(result.per_entry_results[2].error_kind, Some(GatewayErrorKind::AuthenticationFailed));
    assert_eq!(gateway.calls_for(&denied), 1);
}

/// Test: header-only file is a valid, empty batch
#[tokio::test]
async fn zero_entries_is_not_an_error() {
    let gateway = Arc::new(ScriptedGateway::default());
    let ledger = Arc::new(MemoryLedger::new());
    let engine = engine(gateway.clone(), ledger.clone(), EngineConfig::default());

    let result = engine.process_batch(b"walletAddress,amount\n", "empty.csv").await.expect("batch");
    assert_eq!(result.total_entries, 0);
    assert_eq!(result.success_count, 0);
    assert_eq!(result.failed_count, 0);
    assert!(result.per_entry_results.is_empty());
    assert_eq!(gateway.total_calls(), 0);
    assert!(ledger.is_empty().await);
}

/// Test: invalid input fails the whole request before any dispatch
#[tokio::test]
async fn validation_failures_dispatch_nothing() {
    let gateway = Arc::new(ScriptedGateway::default());
    let ledger = Arc::new(MemoryLedger::new());
    let engine = engine(gateway.clone(), ledger.clone(), EngineConfig::default());

    let err = engine.process_batch(b"", "empty.csv").await.unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::EmptyFile)));

    let file = format!("walletAddress,amount\n{},1\n0xnothex,2\n", addr(1));
    let err = engine.process_batch(file.as_bytes(), "bad.csv").await.unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::Line { line: 3, .. })), "{err}");

    let file = format!("walletAddress,amount\n{},0\n", addr(1));
    assert!(matches!(engine.process_batch(file.as_bytes(), "zero.csv").await, Err(Error::Validation(_))));

    assert_eq!(gateway.total_calls(), 0);
    assert!(ledger.is_empty().await);
}

/// Test: JSON payroll files go through the same pipeline
#[tokio::test]
async fn json_payroll_is_accepted() {
    let gateway = Arc::new(ScriptedGateway::default());
    let engine = engine(gateway.clone(), Arc::new(MemoryLedger::new()), EngineConfig::default());
    let file = json!({"instructions": [
        {"walletAddress": addr(7).to_uppercase().replacen("0X", "0x", 1), "amount": "3.25"},
        {"walletAddress": addr(8), "amount": 4},
    ]})
    .to_string();

    let result = engine.process_batch(file.as_bytes(), "p.json").await.expect("batch");
    assert_eq!(result.success_count, 2);
    assert_eq!(result.per_entry_results[0].wallet_address.as_str(), addr(7));
    assert_eq!(result.per_entry_results[1].amount, Amount::parse("4").unwrap());
}

/// Test: missing gateway credentials fail the request before dispatch
#[tokio::test]
async fn missing_credentials_fail_whole_request() {
    let gateway = Arc::new(ScriptedGateway::default());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
    let engine = DisbursementEngine::new(
        Arc::new(AutoPayrollParser),
        gateway.clone(),
        Arc::new(MemoryLedger::new()),
        Arc::new(StaticSecretProvider::new()),
        clock,
        EngineConfig::default(),
    );

    let err = engine.process_batch(&csv(&[(addr(1), "1")]), "p.csv").await.unwrap_err();
    assert!(matches!(err, Error::Secret(SecretError::NotFound(_))));
    assert_eq!(gateway.total_calls(), 0);
}
