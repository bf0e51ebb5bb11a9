//! Materialized feed documents.
//!
//! The harvester writes, the HTTP layer reads. The three rendered
//! documents are replaced together as one immutable snapshot so readers
//! never observe a partially rebuilt feed.

pub mod render;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Config, Record};

/// Channel metadata shared by all three feed formats.
#[derive(Debug, Clone)]
pub struct FeedChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub author_name: String,
    pub author_email: String,
}

impl FeedChannel {
    /// Build the channel identity from configuration. The channel link is
    /// the harvested listing page.
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.feed.title.clone(),
            link: config.harvest.listing_url.clone(),
            description: config.feed.description.clone(),
            author_name: config.feed.author_name.clone(),
            author_email: config.feed.author_email.clone(),
        }
    }
}

/// One feed entry, derived from a stored record.
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Stable identifier, the record fingerprint
    pub id: String,
    pub title: String,
    pub link: String,
    /// Record description with the location appended
    pub description: String,
    /// Creation timestamp, unix seconds
    pub published: i64,
}

impl FeedItem {
    /// Translate a record into its feed representation.
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.fingerprint.clone(),
            title: record.title.clone(),
            link: record.link.clone(),
            description: format!("{}\n\nLocation: {}", record.description, record.location),
            published: record.occurred_at,
        }
    }
}

/// The three rendered documents of one materialization.
#[derive(Debug, Clone)]
pub struct FeedSet {
    pub rss: String,
    pub atom: String,
    pub json: String,
}

/// Holds the current feed snapshot and rebuilds it on demand.
///
/// Readers clone the snapshot `Arc` under a read lock; `rebuild` renders
/// off-lock and swaps the whole snapshot in one write.
pub struct FeedMaterializer {
    channel: FeedChannel,
    current: RwLock<Arc<FeedSet>>,
}

impl FeedMaterializer {
    /// Create a materializer holding a valid empty feed.
    pub fn new(channel: FeedChannel) -> Result<Self> {
        let empty = Self::render(&channel, &[])?;
        Ok(Self {
            channel,
            current: RwLock::new(Arc::new(empty)),
        })
    }

    fn render(channel: &FeedChannel, items: &[FeedItem]) -> Result<FeedSet> {
        Ok(FeedSet {
            rss: render::rss(channel, items)?,
            atom: render::atom(channel, items)?,
            json: render::json_feed(channel, items)?,
        })
    }

    /// Re-render all three documents from the given records and swap the
    /// snapshot.
    pub async fn rebuild(&self, records: &[Record]) -> Result<()> {
        let items: Vec<FeedItem> = records.iter().map(FeedItem::from_record).collect();
        let next = Arc::new(Self::render(&self.channel, &items)?);
        *self.current.write().await = next;
        Ok(())
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<FeedSet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Current RSS document.
    pub async fn rss(&self) -> String {
        self.snapshot().await.rss.clone()
    }

    /// Current Atom document.
    pub async fn atom(&self) -> String {
        self.snapshot().await.atom.clone()
    }

    /// Current JSON Feed document.
    pub async fn json(&self) -> String {
        self.snapshot().await.json.clone()
    }
}
