//! Claim service
//!
//! The exactly-once reward grant. Validation order is fixed: invalid/expired
//! token, then wallet mismatch, then follow check, then double-claim. The
//! check-then-set runs inside the store's `update` critical section so
//! concurrent claims on one token can never both succeed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::clock::Clock;
use crate::error::CredentialError;
use crate::record::ClaimStatusEntry;
use crate::store::CredentialStore;

/// Successful claim result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub energy: u32,
    pub handle: String,
    pub claimed_at: DateTime<Utc>,
}

pub struct ClaimService {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    /// Fixed reward amount per claim.
    energy: u32,
    /// Handle of the account users must follow, for the rejection message.
    target_handle: String,
}

impl ClaimService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        energy: u32,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            energy,
            target_handle: target_handle.into(),
        }
    }

    /// Consumes a verified, unclaimed, unexpired record exactly once.
    pub fn claim(
        &self,
        token: &str,
        wallet_address: &str,
    ) -> Result<ClaimReceipt, CredentialError> {
        let mut outcome: Option<Result<ClaimReceipt, CredentialError>> = None;
        let now = self.clock.now();
        let energy = self.energy;
        let target_handle = &self.target_handle;

        let updated = self.store.update(token, &mut |record| {
            if record.wallet_address != wallet_address {
                outcome = Some(Err(CredentialError::WalletMismatch));
                return;
            }
            if !record.follows {
                outcome = Some(Err(CredentialError::PredicateNotSatisfied {
                    handle: target_handle.clone(),
                }));
                return;
            }
            if record.claimed {
                outcome = Some(Err(CredentialError::AlreadyClaimed));
                return;
            }
            record.claimed = true;
            record.claimed_at = Some(now);
            outcome = Some(Ok(ClaimReceipt {
                energy,
                handle: record.external_account_name.clone(),
                claimed_at: now,
            }));
        });

        if updated.is_err() {
            return Err(CredentialError::InvalidOrExpired);
        }

        let result = outcome.unwrap_or(Err(CredentialError::InvalidOrExpired));
        if let Ok(receipt) = &result {
            info!(
                wallet = wallet_address,
                handle = %receipt.handle,
                energy = receipt.energy,
                "Reward claimed"
            );
        }
        result
    }

    /// All records bound to a wallet, claimed or not, as the status
    /// projection. A filtered read over the store, nothing more.
    pub fn status_for_wallet(&self, wallet_address: &str) -> Vec<ClaimStatusEntry> {
        let mut records = self.store.for_wallet(wallet_address);
        records.sort_by_key(|r| r.verified_at);
        records.iter().map(ClaimStatusEntry::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::verification::VerificationService;
    use chrono::Duration;

    struct Fixture {
        verification: VerificationService,
        claims: Arc<ClaimService>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::starting_now();
        let store = Arc::new(MemoryStore::new(clock.clone()));
        Fixture {
            verification: VerificationService::new(
                store.clone(),
                clock.clone(),
                Duration::minutes(15),
            ),
            claims: Arc::new(ClaimService::new(store.clone(), clock.clone(), 50, "sunaryum")),
            clock,
            store,
        }
    }

    #[test]
    fn never_issued_token_cannot_claim() {
        let fx = fixture();
        assert_eq!(
            fx.claims.claim("nope", "0xAA").unwrap_err(),
            CredentialError::InvalidOrExpired
        );
    }

    #[test]
    fn full_claim_flow_then_double_claim_rejected() {
        let fx = fixture();

        let t = fx.verification.issue("0xAA", "u1", "alice", true);
        let outcome = fx.verification.check_verification(&t, "0xAA").unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.handle, "alice");

        let receipt = fx.claims.claim(&t, "0xAA").unwrap();
        assert_eq!(receipt.energy, 50);
        assert_eq!(receipt.handle, "alice");

        assert_eq!(
            fx.claims.claim(&t, "0xAA").unwrap_err(),
            CredentialError::AlreadyClaimed
        );
    }

    #[test]
    fn non_follower_never_claims_and_never_flips() {
        let fx = fixture();

        let t = fx.verification.issue("0xBB", "u2", "bob", false);
        for _ in 0..3 {
            assert_eq!(
                fx.claims.claim(&t, "0xBB").unwrap_err(),
                CredentialError::PredicateNotSatisfied {
                    handle: "sunaryum".to_string()
                }
            );
        }
        assert!(!fx.store.get(&t).unwrap().claimed);
    }

    #[test]
    fn wallet_mismatch_hides_claim_state() {
        let fx = fixture();

        let t = fx.verification.issue("0xCC", "u1", "alice", true);
        fx.claims.claim(&t, "0xCC").unwrap();

        // A mismatched wallet sees only the mismatch, not AlreadyClaimed.
        assert_eq!(
            fx.claims.claim(&t, "0xDD").unwrap_err(),
            CredentialError::WalletMismatch
        );
    }

    #[test]
    fn expired_token_claims_like_unknown() {
        let fx = fixture();

        let t = fx.verification.issue("0xEE", "u1", "alice", true);
        fx.clock.advance(Duration::minutes(16));

        assert_eq!(
            fx.claims.claim(&t, "0xEE").unwrap_err(),
            CredentialError::InvalidOrExpired
        );
        assert_eq!(fx.store.len(), 0);
    }

    #[test]
    fn concurrent_claims_grant_exactly_once() {
        let fx = fixture();
        let t = fx.verification.issue("0xAA", "u1", "alice", true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let claims = fx.claims.clone();
                let token = t.clone();
                std::thread::spawn(move || claims.claim(&token, "0xAA"))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let granted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 1);
        for r in results.iter().filter(|r| r.is_err()) {
            assert_eq!(
                r.as_ref().unwrap_err(),
                &CredentialError::AlreadyClaimed
            );
        }
    }

    #[test]
    fn claim_history_survives_expiry() {
        let fx = fixture();

        let t = fx.verification.issue("0xAA", "u1", "alice", true);
        fx.claims.claim(&t, "0xAA").unwrap();
        fx.clock.advance(Duration::minutes(16));

        let status = fx.claims.status_for_wallet("0xAA");
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].twitter_handle, "alice");
        assert!(status[0].claimed);
        assert!(status[0].claimed_at.is_some());
    }

    #[test]
    fn status_lists_all_records_for_wallet() {
        let fx = fixture();

        let t1 = fx.verification.issue("0xAA", "u1", "alice", true);
        fx.clock.advance(Duration::seconds(1));
        fx.verification.issue("0xAA", "u2", "bob", false);
        fx.verification.issue("0xZZ", "u3", "carol", true);

        fx.claims.claim(&t1, "0xAA").unwrap();

        let status = fx.claims.status_for_wallet("0xAA");
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].twitter_handle, "alice");
        assert!(status[0].claimed);
        assert!(status[0].claimed_at.is_some());
        assert_eq!(status[1].twitter_handle, "bob");
        assert!(!status[1].claimed);
        assert!(status[1].claimed_at.is_none());
    }
}
