//! Session tokens - HS256 JWT bound to a wallet address
//!
//! Stateless: validity is signature + expiry, nothing is persisted. The
//! signing key is fetched from the secret provider on every mint/verify.
//! A token is valid while `now < exp` and invalid from `exp` on.

use crate::clock::Clock;
use crate::core::paths::secrets as secret_names;
use crate::core::WalletAddress;
use crate::error::{AuthError, Error, Result, SecretError};
use crate::secrets::{self, SecretProvider};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 24 * 60 * 60;
const MIN_KEY_BYTES: usize = 32;

/// Payload stored in the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Wallet address
    pub sub: String,
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub wallet_address: WalletAddress,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Verified session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub wallet_address: WalletAddress,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionIssuer {
    secrets: Arc<dyn SecretProvider>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    issuer: String,
}

impl SessionIssuer {
    pub fn new(
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
        lifetime: Duration,
        issuer: impl Into<String>,
    ) -> Result<Self> {
        if lifetime <= Duration::zero() {
            return Err(Error::Config("session lifetime must be positive".into()));
        }
        Ok(Self { secrets, clock, lifetime, issuer: issuer.into() })
    }

    pub fn lifetime(&self) -> Duration { self.lifetime }

    async fn signing_key(&self) -> Result<Vec<u8>> {
        let key = secrets::get_field(self.secrets.as_ref(), secret_names::SESSION_SIGNING_KEY, "key").await?;
        if key.len() < MIN_KEY_BYTES {
            return Err(SecretError::Malformed(secret_names::SESSION_SIGNING_KEY.into()).into());
        }
        Ok(key.into_bytes())
    }

    pub async fn mint(&self, wallet_address: &WalletAddress) -> Result<SessionToken> {
        let key = self.signing_key().await?;
        let now = self.clock.now();
        let iat = now.timestamp();
        let exp = iat + self.lifetime.num_seconds();
        let claims = SessionClaims { sub: wallet_address.to_string(), iss: self.issuer.clone(), iat, exp };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(&key))
            .map_err(|e| Error::Internal(format!("token encoding: {e}")))?;
        Ok(SessionToken {
            token,
            wallet_address: wallet_address.clone(),
            issued_at: timestamp(iat)?,
            expires_at: timestamp(exp)?,
        })
    }

    pub async fn verify(&self, token: &str) -> Result<Session> {
        let key = self.signing_key().await?;
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock, with no leeway.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<SessionClaims>(token, &DecodingKey::from_secret(&key), &validation)
            .map_err(|_| AuthError::InvalidToken)?
            .claims;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::InvalidToken.into());
        }
        let wallet_address = WalletAddress::parse(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Session {
            wallet_address,
            issued_at: timestamp(claims.iat).map_err(|_| AuthError::InvalidToken)?,
            expires_at: timestamp(claims.exp).map_err(|_| AuthError::InvalidToken)?,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| Error::Internal(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::secrets::StaticSecretProvider;
    use serde_json::json;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn issuer(key: &str) -> (SessionIssuer, ManualClock) {
        let clock = ManualClock::default();
        let secrets = StaticSecretProvider::new().with(secret_names::SESSION_SIGNING_KEY, json!({"key": key}));
        let issuer = SessionIssuer::new(Arc::new(secrets), Arc::new(clock.clone()), Duration::hours(24), "paynode").unwrap();
        (issuer, clock)
    }

    fn addr() -> WalletAddress { WalletAddress::parse("0x3333333333333333333333333333333333333333").unwrap() }

    #[tokio::test]
    async fn valid_until_expiry_then_invalid() {
        let (issuer, clock) = issuer(KEY);
        let minted = issuer.mint(&addr()).await.unwrap();
        assert_eq!(minted.expires_at - minted.issued_at, Duration::hours(24));

        let session = issuer.verify(&minted.token).await.unwrap();
        assert_eq!(session.wallet_address, addr());

        clock.set(minted.expires_at - Duration::seconds(1));
        assert!(issuer.verify(&minted.token).await.is_ok());

        clock.set(minted.expires_at);
        assert!(matches!(issuer.verify(&minted.token).await, Err(Error::Auth(AuthError::InvalidToken))));
    }

    #[tokio::test]
    async fn tampered_token_fails() {
        let (issuer, _) = issuer(KEY);
        let minted = issuer.mint(&addr()).await.unwrap();
        let mut tampered = minted.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        assert!(matches!(issuer.verify(&tampered).await, Err(Error::Auth(AuthError::InvalidToken))));
        assert!(matches!(issuer.verify("not.a.token").await, Err(Error::Auth(AuthError::InvalidToken))));

        let (other, _) = self::issuer("ffffffffffffffffffffffffffffffff");
        assert!(matches!(other.verify(&minted.token).await, Err(Error::Auth(AuthError::InvalidToken))));
    }

    #[tokio::test]
    async fn short_or_missing_key_is_a_secret_fault() {
        let (short, _) = issuer("too-short");
        assert!(matches!(short.mint(&addr()).await, Err(Error::Secret(SecretError::Malformed(_)))));

        let none = SessionIssuer::new(Arc::new(StaticSecretProvider::new()), Arc::new(ManualClock::default()), Duration::hours(1), "p").unwrap();
        assert!(matches!(none.mint(&addr()).await, Err(Error::Secret(SecretError::NotFound(_)))));
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_internal() {
        let (issuer, clock) = issuer(KEY);
        clock.set(DateTime::<Utc>::MAX_UTC - Duration::hours(1));
        assert!(matches!(issuer.mint(&addr()).await, Err(Error::Internal(_))));
    }

    #[test]
    fn lifetime_must_be_finite_and_positive() {
        let secrets: Arc<dyn SecretProvider> = Arc::new(StaticSecretProvider::new());
        assert!(SessionIssuer::new(secrets, Arc::new(ManualClock::default()), Duration::zero(), "p").is_err());
    }
}
