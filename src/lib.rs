//! Paynode: payroll batch disbursement with wallet sign-in.
//!
//! # Architecture
//!
//! ```text
//! Node (entry point)
//!   │
//!   ├── DisbursementEngine
//!   │     ├── PayrollParser   (CSV / JSON)
//!   │     ├── SigningGateway  (custodial signing provider, HTTP)
//!   │     ├── Ledger          (append-only records: file or memory)
//!   │     └── SecretProvider  (gateway credentials)
//!   │
//!   └── AuthController
//!         ├── ChallengeIssuer + ChallengeStore (single-use, 5 min)
//!         ├── SignatureVerifier (secp256k1 personal_sign)
//!         └── SessionIssuer   (HS256 session tokens)
//! ```
//!
//! # Operations
//!
//! | Operation | Method | Description |
//! |-----------|--------|-------------|
//! | process | `node.engine().process_batch(file, name)` | Disburse one payroll file |
//! | list | `node.ledger().list(prefix, limit)` | Ledger records under a date prefix |
//! | challenge | `node.auth().request_challenge(addr)` | Issue a sign-in challenge |
//! | verify | `node.auth().verify(addr, sig, text)` | Trade a signature for a session |
//!
//! # Usage
//!
//! ```ignore
//! use paynode::{Node, NodeConfig};
//!
//! let node = Node::from_config(
//!     NodeConfig::new("payroll")
//!         .with_data_dir("/var/lib/paynode")
//!         .with_gateway_url("https://signer.internal")
//! ).await?;
//!
//! let result = node.engine().process_batch(&bytes, "october.csv").await?;
//! println!("{} of {} paid", result.success_count, result.total_entries);
//! ```

pub mod auth;
pub mod clock;
pub mod core;
pub mod disburse;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod node;
pub mod runtime;
pub mod secrets;
pub mod server;

pub use auth::{AuthController, ChallengeGrant, SessionGrant};
pub use clock::{Clock, ManualClock, SystemClock};
pub use core::{Amount, WalletAddress};
pub use disburse::{BatchResult, DisbursementEngine, EngineConfig, EntryResult};
pub use error::{Error, Result};
pub use gateway::{HttpSigningGateway, SigningGateway};
pub use ledger::{FileLedger, Ledger, MemoryLedger, RecordStatus, TransactionRecord};
pub use node::{LedgerKind, Node, NodeConfig, SecretSource};
pub use runtime::{install_signal_handlers, Shutdown};
pub use secrets::SecretProvider;
pub use server::create_router;
