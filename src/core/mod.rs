//! Core value types shared by disbursement and auth.

pub mod address;
pub mod amount;
pub mod paths;

pub use address::WalletAddress;
pub use amount::Amount;
