//! Follow-Verify - Social-follow verification gating one-time reward claims
//!
//! Issues a time-limited, single-use verification credential tied to a wallet
//! address, based on a Twitter OAuth identity and a follow check against a
//! configured target account, then gates a one-time energy claim behind it.
//!
//! # How it works
//!
//! 1. The frontend binds a wallet address to a session
//! 2. The user completes the OAuth popup flow; the follow check runs
//! 3. A verification record is stored and its opaque token returned
//! 4. The frontend confirms the verification (read-only)
//! 5. The frontend claims the reward (mutating, exactly once per token)
//!
//! # Integrity rules
//!
//! - Tokens are unguessable (uuid v4) and unique across live records
//! - Records expire 15 minutes after issue; expiry is enforced lazily on read
//! - The wallet binding is immutable; mismatched wallets are rejected first
//! - A claim succeeds at most once per token, even under concurrent requests
//! - A failed or negative follow check never grants (fail-closed)

pub mod claim;
pub mod clock;
pub mod config;
pub mod error;
pub mod follow;
pub mod identity;
pub mod record;
pub mod server;
pub mod session;
pub mod store;
pub mod verification;

pub use claim::{ClaimReceipt, ClaimService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CredentialError, StoreError};
pub use follow::{ApiFollowChecker, FollowPredicate};
pub use identity::{IdentityProvider, TwitterOAuth, VerifiedIdentity};
pub use record::{ClaimStatusEntry, VerificationRecord};
pub use session::SessionBinder;
pub use store::{CredentialStore, MemoryStore};
pub use verification::{VerificationOutcome, VerificationService};
