//! Node - wires config into engine, ledger, secrets and auth.
//!
//! `from_config` builds the production collaborators. `assemble` takes
//! them ready-made so tests can swap in fakes.

mod config;

pub use config::{LedgerKind, NodeConfig, SecretSource};

use crate::auth::{AuthController, ChallengeIssuer, ChallengeStore, PersonalSignVerifier, SessionIssuer};
use crate::clock::{Clock, SystemClock};
use crate::disburse::{AutoPayrollParser, DisbursementEngine};
use crate::error::{Error, Result};
use crate::gateway::{HttpSigningGateway, SigningGateway};
use crate::ledger::{FileLedger, Ledger, MemoryLedger};
use crate::secrets::{EnvSecretProvider, FileSecretProvider, SecretProvider};
use std::sync::Arc;
use tracing::info;

pub struct Node {
    config: NodeConfig,
    engine: DisbursementEngine,
    auth: AuthController,
    ledger: Arc<dyn Ledger>,
}

impl Node {
    pub async fn from_config(config: NodeConfig) -> Result<Self> {
        let ledger: Arc<dyn Ledger> = match config.ledger {
            LedgerKind::File => Arc::new(FileLedger::open(&config.data_dir).await?),
            LedgerKind::Memory => Arc::new(MemoryLedger::new()),
        };
        let secrets: Arc<dyn SecretProvider> = match &config.secrets {
            SecretSource::Env => Arc::new(EnvSecretProvider),
            SecretSource::File(path) => Arc::new(FileSecretProvider::new(path)),
        };
        let gateway: Arc<dyn SigningGateway> =
            Arc::new(HttpSigningGateway::new(&config.gateway_url, config.engine.gateway_timeout)?);
        info!(
            app = %config.app,
            ledger = config.ledger.as_str(),
            gateway = %config.gateway_url,
            "node configured"
        );
        Self::assemble(config, ledger, gateway, secrets, Arc::new(SystemClock))
    }

    pub fn assemble(
        config: NodeConfig,
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn SigningGateway>,
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let lifetime = chrono::Duration::from_std(config.session_lifetime)
            .map_err(|_| Error::Config("session lifetime out of range".into()))?;
        let sessions = SessionIssuer::new(secrets.clone(), clock.clone(), lifetime, config.domain.clone())?;
        let challenges = ChallengeIssuer::new(config.domain.clone(), Arc::new(ChallengeStore::new()), clock.clone());
        let auth = AuthController::new(challenges, Arc::new(PersonalSignVerifier), sessions, clock.clone());

        let engine = DisbursementEngine::new(
            Arc::new(AutoPayrollParser),
            gateway,
            ledger.clone(),
            secrets,
            clock,
            config.engine.clone(),
        );
        Ok(Self { config, engine, auth, ledger })
    }

    pub fn app_name(&self) -> &str { &self.config.app }
    pub fn config(&self) -> &NodeConfig { &self.config }
    pub fn engine(&self) -> &DisbursementEngine { &self.engine }
    pub fn auth(&self) -> &AuthController { &self.auth }
    pub fn ledger(&self) -> &Arc<dyn Ledger> { &self.ledger }
}
