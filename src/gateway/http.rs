//! HttpSigningGateway - reqwest client for the signing/payment service

use super::{GatewayCredentials, GatewayError, GatewayErrorKind, Receipt, SigningGateway};
use crate::core::paths::gateway as paths;
use crate::core::{Amount, WalletAddress};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferRequest<'a> {
    wallet_address: &'a str,
    amount: String,
}

/// Statuses the provider uses for an accepted instruction.
const ACCEPTED: &[&str] = &["success", "succeeded", "submitted", "pending", "complete", "completed"];

pub struct HttpSigningGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSigningGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::new(GatewayErrorKind::Unknown, format!("client init: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn transfers_url(&self) -> String { format!("{}{}", self.base_url, paths::TRANSFERS) }
}

#[async_trait]
impl SigningGateway for HttpSigningGateway {
    async fn submit(
        &self,
        wallet_address: &WalletAddress,
        amount: Amount,
        credentials: &GatewayCredentials,
    ) -> Result<Receipt, GatewayError> {
        let body = TransferRequest { wallet_address: wallet_address.as_str(), amount: amount.to_string() };
        debug!(wallet = %wallet_address, %amount, "submitting transfer");

        let response = self
            .client
            .post(self.transfers_url())
            .bearer_auth(&credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        let receipt: Receipt = response
            .json()
            .await
            .map_err(|_| GatewayError::new(GatewayErrorKind::Unknown, "provider returned an unreadable receipt"))?;

        if receipt.provider_transaction_id.is_empty() {
            return Err(GatewayError::new(GatewayErrorKind::Unknown, "provider receipt missing transaction id"));
        }
        if !ACCEPTED.contains(&receipt.status.to_ascii_lowercase().as_str()) {
            return Err(GatewayError::new(
                GatewayErrorKind::InvalidInstruction,
                format!("provider rejected instruction (status {})", receipt.status.chars().take(32).collect::<String>()),
            ));
        }
        Ok(receipt)
    }
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::timeout()
    } else if e.is_connect() {
        GatewayError::new(GatewayErrorKind::ProviderUnavailable, "provider unreachable")
    } else {
        GatewayError::new(GatewayErrorKind::Unknown, "transport error")
    }
}

/// Categorical mapping. Provider bodies are never surfaced.
fn map_status(status: StatusCode) -> GatewayError {
    let kind = match status.as_u16() {
        401 | 403 => GatewayErrorKind::AuthenticationFailed,
        400 | 404 | 409 | 422 => GatewayErrorKind::InvalidInstruction,
        408 | 504 => GatewayErrorKind::Timeout,
        429 | 500..=599 => GatewayErrorKind::ProviderUnavailable,
        _ => GatewayErrorKind::Unknown,
    };
    GatewayError::new(kind, format!("provider returned HTTP {}", status.as_u16()))
}
