//! Verification record: the single entity of the credential lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A follow-verification credential bound to a wallet.
///
/// Created once by the verification service, mutated only by the claim flip
/// or by lazy-expiry deletion. `wallet_address` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Opaque bearer capability; primary key in the store.
    pub token: String,
    /// Identity-provider account id.
    pub external_account_id: String,
    /// Display handle, surfaced to the caller.
    pub external_account_name: String,
    /// Follow-predicate result captured at verification time.
    pub follows: bool,
    /// Wallet the record is bound to (may be empty if no session binding).
    pub wallet_address: String,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl VerificationRecord {
    /// A record is live while `now <= expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Per-wallet projection returned by the claim-status listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatusEntry {
    pub twitter_handle: String,
    pub claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub verified_at: DateTime<Utc>,
}

impl From<&VerificationRecord> for ClaimStatusEntry {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            twitter_handle: record.external_account_name.clone(),
            claimed: record.claimed,
            claimed_at: record.claimed_at,
            verified_at: record.verified_at,
        }
    }
}
