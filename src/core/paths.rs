//! Path and name constants
//!
//! Centralized registry for ledger namespaces, secret names and HTTP routes.

/// Ledger storage layout
pub mod ledger {
    /// Fixed namespace every record lives under.
    pub const NAMESPACE: &str = "transactions";
    pub const RECORD_EXT: &str = "json";
    pub const TEMP_EXT: &str = "json.tmp";

    pub const DEFAULT_LIST_LIMIT: usize = 100;
    pub const MAX_LIST_LIMIT: usize = 1000;
}

/// Secret names held by the secret provider
pub mod secrets {
    /// `{"apiKey": "..."}`
    pub const SIGNING_GATEWAY: &str = "signing-gateway";
    /// `{"key": "..."}`
    pub const SESSION_SIGNING_KEY: &str = "session-signing-key";

    pub const ENV_PREFIX: &str = "PAYNODE_SECRET_";
}

/// Inbound HTTP routes
pub mod routes {
    pub const HEALTH: &str = "/health";
    pub const BATCHES: &str = "/batches";
    pub const TRANSACTIONS: &str = "/transactions";
    pub const TRANSACTION: &str = "/transactions/:id";
    pub const AUTH_CHALLENGE: &str = "/auth/challenge";
    pub const AUTH_VERIFY: &str = "/auth/verify";
    pub const AUTH_SESSION: &str = "/auth/session";

    /// Multipart field carrying the payroll file.
    pub const UPLOAD_FIELD: &str = "file";
}

/// Signing gateway endpoints (relative to the configured base URL)
pub mod gateway {
    pub const TRANSFERS: &str = "/v1/transfers";
}

/// Default application/domain identifier bound into every challenge.
pub const DEFAULT_DOMAIN: &str = "paynode";
