// src/services/gate.rs

//! Duplicate detection for harvested records.

use std::sync::Arc;

use crate::models::Record;
use crate::storage::RecordStore;

/// Decides whether a candidate record already exists.
///
/// The current pass's accepted batch is checked first, saving a store
/// round-trip for entries the listing shows twice. An ambiguous store
/// answer counts as a duplicate; the unique index is the final authority.
pub struct DuplicateGate {
    store: Arc<dyn RecordStore>,
}

impl DuplicateGate {
    /// Create a gate backed by the given store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Check the in-flight batch, then the store, for the candidate's
    /// fingerprint.
    pub async fn is_duplicate(&self, candidate: &Record, batch: &[Record]) -> bool {
        if batch.iter().any(|r| r.fingerprint == candidate.fingerprint) {
            return true;
        }

        match self.store.find_by_fingerprint(&candidate.fingerprint).await {
            Ok(None) => false,
            Ok(Some(_)) => true,
            Err(e) => {
                log::warn!(
                    "Duplicate check for {} hit a store error, treating as duplicate: {}",
                    candidate.fingerprint,
                    e
                );
                true
            }
        }
    }
}
