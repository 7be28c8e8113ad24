//! Challenge issuing and the per-address challenge store.

use crate::clock::Clock;
use crate::core::WalletAddress;
use crate::error::AuthError;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const CHALLENGE_TTL_SECS: i64 = 300;
pub const NONCE_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub wallet_address: WalletAddress,
    pub nonce: [u8; NONCE_BYTES],
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Exact text the wallet signs.
    pub text: String,
}

impl AuthChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }

    /// Whole seconds left, never negative.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 { (self.expires_at - now).num_seconds().max(0) }
}

/// Binds domain, address, nonce and both timestamps into one signable string.
pub fn challenge_text(
    domain: &str,
    wallet_address: &WalletAddress,
    nonce: &[u8; NONCE_BYTES],
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> String {
    format!(
        "{domain} wants you to sign in with your wallet:\n{wallet_address}\n\nNonce: {}\nIssued At: {}\nExpiration Time: {}",
        hex::encode(nonce),
        issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// At most one live challenge per address. `take` is the only way out,
/// and it removes under the lock, so a challenge is handed out once.
#[derive(Debug, Default)]
pub struct ChallengeStore {
    live: Mutex<HashMap<WalletAddress, AuthChallenge>>,
}

impl ChallengeStore {
    pub fn new() -> Self { Self::default() }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<WalletAddress, AuthChallenge>> {
        self.live.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Stores `challenge`, returning any unconsumed one it replaced.
    pub fn insert(&self, challenge: AuthChallenge) -> Option<AuthChallenge> {
        self.guard().insert(challenge.wallet_address.clone(), challenge)
    }

    /// Atomic read-and-delete.
    pub fn take(&self, wallet_address: &WalletAddress) -> Option<AuthChallenge> {
        self.guard().remove(wallet_address)
    }

    pub fn peek(&self, wallet_address: &WalletAddress) -> Option<AuthChallenge> {
        self.guard().get(wallet_address).cloned()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.guard();
        let before = guard.len();
        guard.retain(|_, c| !c.is_expired_at(now));
        before - guard.len()
    }

    pub fn len(&self) -> usize { self.guard().len() }

    pub fn is_empty(&self) -> bool { self.guard().is_empty() }
}

pub struct ChallengeIssuer {
    domain: String,
    ttl: Duration,
    store: Arc<ChallengeStore>,
    clock: Arc<dyn Clock>,
}

impl ChallengeIssuer {
    pub fn new(domain: impl Into<String>, store: Arc<ChallengeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { domain: domain.into(), ttl: Duration::seconds(CHALLENGE_TTL_SECS), store, clock }
    }

    pub fn store(&self) -> &Arc<ChallengeStore> { &self.store }
    pub fn domain(&self) -> &str { &self.domain }
    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, wallet_address: &str) -> Result<AuthChallenge, AuthError> {
        let wallet_address = WalletAddress::parse(wallet_address).map_err(|_| AuthError::InvalidAddress)?;
        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);

        let issued_at = self.clock.now();
        let expires_at = issued_at + self.ttl;
        let challenge = AuthChallenge {
            text: challenge_text(&self.domain, &wallet_address, &nonce, issued_at, expires_at),
            wallet_address,
            nonce,
            issued_at,
            expires_at,
        };
        if self.store.insert(challenge.clone()).is_some() {
            debug!(wallet = %challenge.wallet_address, "replaced unconsumed challenge");
        }
        Ok(challenge)
    }
}
