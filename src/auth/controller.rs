//! AuthController - two-step wallet sign-in
//!
//! ```text
//! NoChallenge ──request_challenge──► ChallengeIssued ──verify──┬─► Verified  → session token
//!      ▲                                                        ├─► Rejected  (InvalidSignature)
//!      └──────────── challenge deleted on every outcome ◄───────┴─► Expired   (ChallengeExpired)
//! ```
//!
//! `verify` takes the challenge out of the store before looking at it, so
//! two concurrent verifies for one address cannot both see it live.

use super::challenge::{ChallengeIssuer, ChallengeStore};
use super::session::{Session, SessionIssuer};
use super::verifier::SignatureVerifier;
use crate::clock::Clock;
use crate::core::WalletAddress;
use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Observable per-address state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    NoChallenge,
    ChallengeIssued,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeGrant {
    pub challenge: String,
    /// Seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub token: String,
    pub wallet_address: WalletAddress,
    /// Seconds
    pub expires_in: i64,
}

pub struct AuthController {
    challenges: ChallengeIssuer,
    verifier: Arc<dyn SignatureVerifier>,
    sessions: SessionIssuer,
    clock: Arc<dyn Clock>,
}

impl AuthController {
    pub fn new(
        challenges: ChallengeIssuer,
        verifier: Arc<dyn SignatureVerifier>,
        sessions: SessionIssuer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { challenges, verifier, sessions, clock }
    }

    pub fn store(&self) -> &Arc<ChallengeStore> { self.challenges.store() }

    pub fn request_challenge(&self, wallet_address: &str) -> std::result::Result<ChallengeGrant, AuthError> {
        let challenge = self.challenges.issue(wallet_address)?;
        info!(wallet = %challenge.wallet_address, expires_at = %challenge.expires_at, "challenge issued");
        Ok(ChallengeGrant { expires_in: challenge.expires_in(challenge.issued_at), challenge: challenge.text })
    }

    /// `presented_challenge`, when given, must match the issued text exactly.
    pub async fn verify(
        &self,
        wallet_address: &str,
        signature: &str,
        presented_challenge: Option<&str>,
    ) -> Result<SessionGrant> {
        let wallet_address = WalletAddress::parse(wallet_address).map_err(|_| AuthError::InvalidAddress)?;

        // Consumed here, whatever happens next.
        let Some(challenge) = self.store().take(&wallet_address) else {
            warn!(wallet = %wallet_address, "verify without live challenge");
            return Err(AuthError::ChallengeExpired.into());
        };

        let now = self.clock.now();
        if challenge.is_expired_at(now) {
            warn!(wallet = %wallet_address, "challenge expired");
            return Err(AuthError::ChallengeExpired.into());
        }
        if presented_challenge.is_some_and(|text| text != challenge.text) {
            warn!(wallet = %wallet_address, "presented challenge does not match issued one");
            return Err(AuthError::InvalidSignature.into());
        }
        if !self.verifier.verify(&wallet_address, &challenge.text, signature) {
            warn!(wallet = %wallet_address, "signature rejected");
            return Err(AuthError::InvalidSignature.into());
        }

        let session = self.sessions.mint(&wallet_address).await?;
        info!(wallet = %wallet_address, expires_at = %session.expires_at, "wallet verified");
        Ok(SessionGrant {
            token: session.token,
            wallet_address,
            expires_in: (session.expires_at - session.issued_at).num_seconds(),
        })
    }

    pub fn state(&self, wallet_address: &str) -> std::result::Result<ChallengeState, AuthError> {
        let wallet_address = WalletAddress::parse(wallet_address).map_err(|_| AuthError::InvalidAddress)?;
        Ok(match self.store().peek(&wallet_address) {
            None => ChallengeState::NoChallenge,
            Some(c) if c.is_expired_at(self.clock.now()) => ChallengeState::Expired,
            Some(_) => ChallengeState::ChallengeIssued,
        })
    }

    pub async fn validate_session(&self, token: &str) -> Result<Session> {
        self.sessions.verify(token).await
    }

    pub fn purge_expired(&self) -> usize {
        self.store().purge_expired(self.clock.now())
    }
}
