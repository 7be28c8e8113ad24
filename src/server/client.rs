//! NodeClient - talks to a running node's sign-in routes
//!
//! Challenges live in the serving process, so anything that wants one
//! verified later (the CLI, operator scripts) has to ask that process.

use super::error::ErrorResponse;
use crate::auth::ChallengeGrant;
use crate::core::paths::routes;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("node unreachable: {0}")]
    Unreachable(String),
    #[error("node refused request ({status}, {code}): {message}")]
    Rejected { status: u16, code: String, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

pub struct NodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unreachable(format!("client init: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    pub async fn request_challenge(&self, wallet_address: &str) -> Result<ChallengeGrant, ClientError> {
        let url = format!("{}{}", self.base_url, routes::AUTH_CHALLENGE);
        let response = self
            .client
            .post(&url)
            .json(&json!({"walletAddress": wallet_address}))
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response.json().await.map_err(|e| ClientError::Decode(e.to_string()));
        }
        match response.json::<ErrorResponse>().await {
            Ok(body) => Err(ClientError::Rejected { status: status.as_u16(), code: body.code, message: body.error }),
            Err(_) => Err(ClientError::Rejected { status: status.as_u16(), code: "UNKNOWN".into(), message: status.to_string() }),
        }
    }
}
