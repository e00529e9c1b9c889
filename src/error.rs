//! Error types
//!
//! `CredentialError` covers the four expected, user-facing outcomes of the
//! verify/claim endpoints; the `Display` strings are the exact messages sent
//! back to the client. `StoreError` is internal to the credential store.

use thiserror::Error;

/// Recoverable, user-facing verification/claim outcomes. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Token unknown, never issued, or past its TTL.
    #[error("Invalid or expired token")]
    InvalidOrExpired,

    /// Token exists but is bound to a different wallet.
    #[error("Token does not match wallet")]
    WalletMismatch,

    /// The follow check came back negative at verification time.
    #[error("You do not follow @{handle}")]
    PredicateNotSatisfied { handle: String },

    /// The reward behind this token was already consumed.
    #[error("Reward already claimed for this verification")]
    AlreadyClaimed,
}

/// Internal store failures. `DuplicateToken` indicates a broken token
/// generator and is logged, never surfaced to users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("token already present in store")]
    DuplicateToken,

    #[error("no live record for token")]
    NotFound,
}
