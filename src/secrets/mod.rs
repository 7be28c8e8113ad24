//! Secret provider - named secrets (gateway credentials, token signing key).
//!
//! Components fetch at use time and do not hold secrets. Caching, if any,
//! is the provider's business.
//!
//! | Provider | Source |
//! |----------|--------|
//! | `EnvSecretProvider` | `PAYNODE_SECRET_<NAME>` env var holding JSON |
//! | `FileSecretProvider` | JSON object file `{ "<name>": {...} }`, re-read per call |
//! | `StaticSecretProvider` | in-memory map (dev, tests) |

use crate::core::paths::secrets as names;
use crate::error::SecretError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get(&self, name: &str) -> Result<Value, SecretError>;
}

/// Pull one string field out of a structured secret.
pub async fn get_field(provider: &dyn SecretProvider, name: &str, field: &str) -> Result<String, SecretError> {
    let secret = provider.get(name).await?;
    secret
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SecretError::Malformed(name.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    /// `signing-gateway` → `PAYNODE_SECRET_SIGNING_GATEWAY`
    pub fn var_name(name: &str) -> String {
        let upper: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", names::ENV_PREFIX, upper)
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get(&self, name: &str) -> Result<Value, SecretError> {
        let raw = std::env::var(Self::var_name(name)).map_err(|_| SecretError::NotFound(name.to_string()))?;
        serde_json::from_str(&raw).map_err(|_| SecretError::Malformed(name.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn get(&self, name: &str) -> Result<Value, SecretError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SecretError::Unavailable(format!("{}: {}", self.path.display(), e.kind())))?;
        let all: Value = serde_json::from_str(&raw)
            .map_err(|_| SecretError::Unavailable(format!("{}: not a JSON object", self.path.display())))?;
        all.get(name).cloned().ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, Value>,
}

impl StaticSecretProvider {
    pub fn new() -> Self { Self::default() }
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.secrets.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get(&self, name: &str) -> Result<Value, SecretError> {
        self.secrets.get(name).cloned().ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn env_var_names() {
        assert_eq!(EnvSecretProvider::var_name("signing-gateway"), "PAYNODE_SECRET_SIGNING_GATEWAY");
        assert_eq!(EnvSecretProvider::var_name("session-signing-key"), "PAYNODE_SECRET_SESSION_SIGNING_KEY");
    }

    #[tokio::test]
    async fn static_provider_and_fields() {
        let p = StaticSecretProvider::new().with("signing-gateway", json!({"apiKey": "k1"}));
        assert_eq!(get_field(&p, "signing-gateway", "apiKey").await.unwrap(), "k1");
        assert!(matches!(get_field(&p, "signing-gateway", "other").await, Err(SecretError::Malformed(_))));
        assert!(matches!(p.get("missing").await, Err(SecretError::NotFound(_))));
    }

    #[tokio::test]
    async fn file_provider_reads_per_call() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("secrets.json");
        let p = FileSecretProvider::new(&path);
        assert!(matches!(p.get("x").await, Err(SecretError::Unavailable(_))));

        std::fs::write(&path, json!({"session-signing-key": {"key": "a"}}).to_string()).unwrap();
        assert_eq!(p.get("session-signing-key").await.unwrap()["key"], "a");

        std::fs::write(&path, json!({"session-signing-key": {"key": "b"}}).to_string()).unwrap();
        assert_eq!(p.get("session-signing-key").await.unwrap()["key"], "b");
        assert!(matches!(p.get("nope").await, Err(SecretError::NotFound(_))));
    }
}
