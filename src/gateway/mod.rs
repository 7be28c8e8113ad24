//! Signing gateway - submits one payout instruction to the external
//! signing/payment service.
//!
//! # Architecture
//!
//! ```text
//! DisbursementEngine
//!     │  submit(address, amount, credentials)
//!     ▼
//! SigningGateway (trait)
//!     ├── HttpSigningGateway   POST {base}/v1/transfers, bearer apiKey
//!     └── test fakes           scripted receipts / failures
//! ```
//!
//! No retries happen here. The engine owns retry policy.

mod http;

pub use http::HttpSigningGateway;

use crate::core::{Amount, WalletAddress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Provider-confirmed record of a submitted instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub provider_transaction_id: String,
    pub status: String,
}

/// Bearer credential for the gateway. Never printed.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub api_key: String,
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials").field("api_key", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayErrorKind {
    AuthenticationFailed,
    InvalidInstruction,
    ProviderUnavailable,
    Timeout,
    Unknown,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayErrorKind::AuthenticationFailed => "AuthenticationFailed",
            GatewayErrorKind::InvalidInstruction => "InvalidInstruction",
            GatewayErrorKind::ProviderUnavailable => "ProviderUnavailable",
            GatewayErrorKind::Timeout => "Timeout",
            GatewayErrorKind::Unknown => "Unknown",
        }
    }

    /// Only transient provider outages are worth another attempt.
    pub fn is_retryable(&self) -> bool { matches!(self, GatewayErrorKind::ProviderUnavailable) }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
    pub fn timeout() -> Self { Self::new(GatewayErrorKind::Timeout, "gateway call timed out") }
}

#[async_trait]
pub trait SigningGateway: Send + Sync {
    async fn submit(
        &self,
        wallet_address: &WalletAddress,
        amount: Amount,
        credentials: &GatewayCredentials,
    ) -> Result<Receipt, GatewayError>;
}
