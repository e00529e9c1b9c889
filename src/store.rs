//! Credential store
//!
//! Token → `VerificationRecord` map with read-triggered expiry: any lookup of
//! a record past its TTL deletes it and reports not-found, so expired state
//! never escapes the store. The trait keeps the backing swappable; the
//! in-memory implementation matches the ephemeral, empty-at-startup behavior
//! the reward flow expects.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::record::VerificationRecord;

pub trait CredentialStore: Send + Sync {
    /// Inserts under `record.token`. `DuplicateToken` if already present.
    fn put(&self, record: VerificationRecord) -> Result<(), StoreError>;

    /// Returns the live record, or `None` if absent or expired (expired
    /// records are deleted as a side effect).
    fn get(&self, token: &str) -> Option<VerificationRecord>;

    /// Idempotent removal.
    fn delete(&self, token: &str);

    /// Atomic read-modify-write of a single live record. The mutator runs
    /// inside the store's critical section; the post-mutation snapshot is
    /// returned. Same expiry rule as `get`.
    fn update(
        &self,
        token: &str,
        mutator: &mut dyn FnMut(&mut VerificationRecord),
    ) -> Result<VerificationRecord, StoreError>;

    /// All records bound to a wallet. Expired unclaimed records are purged,
    /// not returned; claimed records are terminal and stay listed as claim
    /// history.
    fn for_wallet(&self, wallet_address: &str) -> Vec<VerificationRecord>;

    /// Count of records currently held, including not-yet-observed expired
    /// ones.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired unclaimed record; returns how many were
    /// dropped. Only bounds memory, never changes observable semantics.
    fn purge_expired(&self) -> usize;
}

pub struct MemoryStore {
    records: Mutex<HashMap<String, VerificationRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl CredentialStore for MemoryStore {
    fn put(&self, record: VerificationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.token) {
            return Err(StoreError::DuplicateToken);
        }
        records.insert(record.token.clone(), record);
        Ok(())
    }

    fn get(&self, token: &str) -> Option<VerificationRecord> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        let expired = records.get(token).map(|r| r.is_expired(now))?;
        if expired {
            records.remove(token);
            return None;
        }
        records.get(token).cloned()
    }

    fn delete(&self, token: &str) {
        self.records.lock().remove(token);
    }

    fn update(
        &self,
        token: &str,
        mutator: &mut dyn FnMut(&mut VerificationRecord),
    ) -> Result<VerificationRecord, StoreError> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        let expired = records
            .get(token)
            .map(|r| r.is_expired(now))
            .ok_or(StoreError::NotFound)?;
        if expired {
            records.remove(token);
            return Err(StoreError::NotFound);
        }
        let record = records.get_mut(token).ok_or(StoreError::NotFound)?;
        mutator(record);
        Ok(record.clone())
    }

    fn for_wallet(&self, wallet_address: &str) -> Vec<VerificationRecord> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        records.retain(|_, r| r.claimed || !r.is_expired(now));
        records
            .values()
            .filter(|r| r.wallet_address == wallet_address)
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| r.claimed || !r.is_expired(now));
        before - records.len()
    }
}
