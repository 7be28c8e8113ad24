//! Wallet sign-in: challenge, signature, session.
//!
//! A caller asks for a challenge bound to its wallet address, signs the
//! exact challenge text with that wallet, and trades the signature for a
//! session token. Challenges are single-use and live for five minutes.

pub mod challenge;
pub mod controller;
pub mod session;
pub mod verifier;

pub use challenge::{AuthChallenge, ChallengeIssuer, ChallengeStore, CHALLENGE_TTL_SECS};
pub use controller::{AuthController, ChallengeGrant, ChallengeState, SessionGrant};
pub use session::{Session, SessionClaims, SessionIssuer, SessionToken, DEFAULT_SESSION_LIFETIME_SECS};
pub use verifier::{address_from_key, recover_address, sign_personal_message, PersonalSignVerifier, SignatureVerifier};
