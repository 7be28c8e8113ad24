//! Disbursement - payroll file in, batch result out.
//!
//! # Flow
//!
//! ```text
//! file bytes ──► PayrollParser ──► PayrollBatch (ordered instructions)
//!                                        │
//!                     ┌──────────────────┼──────────────────┐   bounded
//!                     ▼                  ▼                  ▼   concurrency
//!               SigningGateway     SigningGateway     SigningGateway
//!                     │                  │                  │
//!                     ▼                  ▼                  ▼
//!                 Ledger.append      Ledger.append      Ledger.append
//!                     │                  │                  │
//!                     └────────► slot[idx] ◄────────────────┘
//!                                        │
//!                                        ▼
//!                                   BatchResult
//! ```

mod engine;
mod payroll;

pub use engine::{BatchResult, DisbursementEngine, EngineConfig, EntryResult, MAX_CONCURRENCY};
pub use payroll::{
    AutoPayrollParser, CsvPayrollParser, JsonPayrollParser, PayrollBatch, PayrollInstruction, PayrollParser,
};
