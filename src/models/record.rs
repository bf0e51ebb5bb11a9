//! Incident record data structure.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel used when no description could be extracted for a record.
pub const DESCRIPTION_PLACEHOLDER: &str = "Keine Beschreibung gefunden";

/// One incident announcement harvested from the listing page.
///
/// Records are immutable once created. The store adds its own row id and
/// audit timestamp; the fingerprint is the application-level identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Record {
    /// Announcement title
    pub title: String,

    /// Description text, or [`DESCRIPTION_PLACEHOLDER`] if enrichment failed
    pub description: String,

    /// District / location label with the listing prefix stripped
    pub location: String,

    /// Full URL to the announcement detail page
    pub link: String,

    /// Occurrence timestamp, unix seconds
    pub occurred_at: i64,

    /// Deterministic short hash of (title, occurred_at); unique per store
    pub fingerprint: String,
}

impl Record {
    /// Build a record from listing data. The description starts out as the
    /// placeholder and is filled in by enrichment.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        location: impl Into<String>,
        occurred_at: i64,
    ) -> Self {
        let title = title.into();
        let fingerprint = fingerprint(&title, occurred_at);
        Self {
            title,
            description: DESCRIPTION_PLACEHOLDER.to_string(),
            location: location.into(),
            link: link.into(),
            occurred_at,
            fingerprint,
        }
    }
}

/// Compute the fingerprint for a (title, occurrence timestamp) pair.
///
/// First 8 bytes of SHA-256 over the concatenation, hex encoded. The same
/// inputs always produce the same 16-character digest.
pub fn fingerprint(title: &str, occurred_at: i64) -> String {
    let digest = Sha256::digest(format!("{title}{occurred_at}").as_bytes());
    hex::encode(&digest[..8])
}
