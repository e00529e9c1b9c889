//! Verification service
//!
//! Turns a resolved (identity, follow-predicate, wallet) triple into a stored
//! `VerificationRecord` and hands the opaque token back to the caller.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::CredentialError;
use crate::record::VerificationRecord;
use crate::store::CredentialStore;

/// Read-only result of `check_verification`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub handle: String,
}

pub struct VerificationService {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl VerificationService {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Creates a record for a completed identity + follow-check resolution
    /// and returns its token. An empty `wallet_address` means no session
    /// binding happened; the record is still issued and the later wallet
    /// comparison will fail recoverably.
    pub fn issue(
        &self,
        wallet_address: &str,
        external_account_id: &str,
        external_account_name: &str,
        follows: bool,
    ) -> String {
        loop {
            let token = Uuid::new_v4().to_string();
            let now = self.clock.now();
            let record = VerificationRecord {
                token: token.clone(),
                external_account_id: external_account_id.to_string(),
                external_account_name: external_account_name.to_string(),
                follows,
                wallet_address: wallet_address.to_string(),
                verified_at: now,
                expires_at: now + self.ttl,
                claimed: false,
                claimed_at: None,
            };
            match self.store.put(record) {
                Ok(()) => {
                    info!(
                        handle = external_account_name,
                        follows, "Issued verification token"
                    );
                    return token;
                }
                Err(_) => {
                    // A v4 collision means the generator is broken; regenerate
                    // rather than surface an internal fault to the user.
                    error!("Verification token collision, regenerating");
                }
            }
        }
    }

    /// Read-only confirmation: reports the follow result captured at issue
    /// time. Mutates nothing beyond the store's lazy-expiry side effect.
    pub fn check_verification(
        &self,
        token: &str,
        wallet_address: &str,
    ) -> Result<VerificationOutcome, CredentialError> {
        let record = self
            .store
            .get(token)
            .ok_or(CredentialError::InvalidOrExpired)?;

        if record.wallet_address != wallet_address {
            return Err(CredentialError::WalletMismatch);
        }

        Ok(VerificationOutcome {
            verified: record.follows,
            handle: record.external_account_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::record::VerificationRecord;
    use crate::store::{CredentialStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> (VerificationService, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = ManualClock::starting_now();
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let service = VerificationService::new(store.clone(), clock.clone(), Duration::minutes(15));
        (service, clock, store)
    }

    #[test]
    fn never_issued_token_is_invalid() {
        let (service, _, _) = service();
        assert_eq!(
            service.check_verification("nope", "0xAA").unwrap_err(),
            CredentialError::InvalidOrExpired
        );
    }

    #[test]
    fn check_reports_follow_result_at_issue_time() {
        let (service, _, _) = service();

        let t = service.issue("0xAA", "u1", "alice", true);
        let outcome = service.check_verification(&t, "0xAA").unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.handle, "alice");

        let t2 = service.issue("0xAA", "u2", "bob", false);
        assert!(!service.check_verification(&t2, "0xAA").unwrap().verified);
    }

    #[test]
    fn check_is_read_only() {
        let (service, _, store) = service();

        let t = service.issue("0xAA", "u1", "alice", true);
        service.check_verification(&t, "0xAA").unwrap();
        service.check_verification(&t, "0xAA").unwrap();

        let record = store.get(&t).unwrap();
        assert!(!record.claimed);
        assert!(record.claimed_at.is_none());
    }

    #[test]
    fn wrong_wallet_is_rejected() {
        let (service, _, _) = service();

        let t = service.issue("0xCC", "u1", "alice", true);
        assert_eq!(
            service.check_verification(&t, "0xDD").unwrap_err(),
            CredentialError::WalletMismatch
        );
    }

    #[test]
    fn expired_token_indistinguishable_from_unknown() {
        let (service, clock, store) = service();

        let t = service.issue("0xEE", "u1", "alice", true);
        clock.advance(Duration::minutes(16));

        assert_eq!(
            service.check_verification(&t, "0xEE").unwrap_err(),
            CredentialError::InvalidOrExpired
        );
        // Purged by the lookup, not merely hidden.
        assert!(store.get(&t).is_none());
        assert_eq!(store.len(), 0);
    }

    /// Store whose first `put` reports a token collision, then delegates.
    struct CollidingStore {
        inner: MemoryStore,
        collisions_left: AtomicUsize,
    }

    impl CredentialStore for CollidingStore {
        fn put(&self, record: VerificationRecord) -> Result<(), StoreError> {
            if self.collisions_left.load(Ordering::SeqCst) > 0 {
                self.collisions_left.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::DuplicateToken);
            }
            self.inner.put(record)
        }

        fn get(&self, token: &str) -> Option<VerificationRecord> {
            self.inner.get(token)
        }

        fn delete(&self, token: &str) {
            self.inner.delete(token)
        }

        fn update(
            &self,
            token: &str,
            mutator: &mut dyn FnMut(&mut VerificationRecord),
        ) -> Result<VerificationRecord, StoreError> {
            self.inner.update(token, mutator)
        }

        fn for_wallet(&self, wallet_address: &str) -> Vec<VerificationRecord> {
            self.inner.for_wallet(wallet_address)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn purge_expired(&self) -> usize {
            self.inner.purge_expired()
        }
    }

    #[test]
    fn issue_regenerates_on_token_collision() {
        let clock = ManualClock::starting_now();
        let store = Arc::new(CollidingStore {
            inner: MemoryStore::new(clock.clone()),
            collisions_left: AtomicUsize::new(1),
        });
        let service =
            VerificationService::new(store.clone(), clock.clone(), Duration::minutes(15));

        let token = service.issue("0xAA", "u1", "alice", true);

        // The retry stored exactly one record under the fresh token.
        assert_eq!(store.len(), 1);
        assert_eq!(store.collisions_left.load(Ordering::SeqCst), 0);
        let outcome = service.check_verification(&token, "0xAA").unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.handle, "alice");
    }

    #[test]
    fn empty_wallet_binding_fails_later_comparison() {
        let (service, _, _) = service();

        let t = service.issue("", "u1", "alice", true);
        assert_eq!(
            service.check_verification(&t, "0xAA").unwrap_err(),
            CredentialError::WalletMismatch
        );
        // The record itself is intact under the empty binding.
        assert!(service.check_verification(&t, "").unwrap().verified);
    }
}
