//! Node Configuration - built by the CLI or by tests

use crate::auth::DEFAULT_SESSION_LIFETIME_SECS;
use crate::core::paths::DEFAULT_DOMAIN;
use crate::disburse::EngineConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerKind {
    #[default]
    File,
    Memory,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::File => "file",
            LedgerKind::Memory => "memory",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "fs" => Some(LedgerKind::File),
            "memory" | "mem" => Some(LedgerKind::Memory),
            _ => None,
        }
    }
}

/// Where `signing-gateway` and `session-signing-key` come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecretSource {
    /// `PAYNODE_SECRET_<NAME>` variables holding JSON.
    #[default]
    Env,
    /// One JSON object keyed by secret name, re-read on every lookup.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub app: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub ledger: LedgerKind,
    pub gateway_url: String,
    pub domain: String,
    pub secrets: SecretSource,
    pub session_lifetime: Duration,
    pub engine: EngineConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            app: "paynode".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            ledger: LedgerKind::default(),
            gateway_url: "http://127.0.0.1:9000".into(),
            domain: DEFAULT_DOMAIN.into(),
            secrets: SecretSource::default(),
            session_lifetime: Duration::from_secs(DEFAULT_SESSION_LIFETIME_SECS as u64),
            engine: EngineConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into(), ..Default::default() }
    }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self { self.data_dir = path.into(); self }
    pub fn with_ledger(mut self, kind: LedgerKind) -> Self { self.ledger = kind; self }
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self { self.gateway_url = url.into(); self }
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self { self.domain = domain.into(); self }
    pub fn with_secrets(mut self, source: SecretSource) -> Self { self.secrets = source; self }
    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self { self.session_lifetime = lifetime; self }
    pub fn with_gateway_timeout(mut self, t: Duration) -> Self { self.engine.gateway_timeout = t; self }
    pub fn with_ledger_timeout(mut self, t: Duration) -> Self { self.engine.ledger_timeout = t; self }
    pub fn with_concurrency(mut self, n: usize) -> Self { self.engine.concurrency = n; self }
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.engine.max_attempts = max_attempts.max(1);
        self.engine.retry_backoff = backoff;
        self
    }
}
