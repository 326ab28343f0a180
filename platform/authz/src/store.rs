use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{StoreError, Tier};

/// Subscription record owned by a vendor user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRecord {
    pub id: String,
    pub user: String,
    pub tier: Tier,
}

/// Lookup seam consulted by the tier resolvers.
#[async_trait]
pub trait VendorStore: Send + Sync {
    /// Vendor records whose `user` equals `user_id`. Zero or one is expected.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<VendorRecord>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Process-local store, mostly for tests and fixtures.
#[derive(Debug, Default)]
pub struct InMemoryVendorStore {
    records: Mutex<Vec<VendorRecord>>,
    lookups: AtomicUsize,
    failing: AtomicBool,
}

#[derive(Debug, thiserror::Error)]
#[error("in-memory vendor store is marked as failing")]
struct Unavailable;

impl InMemoryVendorStore {
    pub fn new(records: impl IntoIterator<Item = VendorRecord>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Replace the tier on every record owned by `user_id`.
    pub fn set_tier(&self, user_id: &str, tier: Tier) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        for record in records.iter_mut().filter(|r| r.user == user_id) {
            record.tier = tier;
        }
    }

    pub fn insert(&self, record: VendorRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    /// Make subsequent lookups fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `find_by_user` calls seen so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VendorStore for InMemoryVendorStore {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<VendorRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend(Unavailable));
        }
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .filter(|record| record.user == user_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend(Unavailable));
        }
        Ok(())
    }
}
