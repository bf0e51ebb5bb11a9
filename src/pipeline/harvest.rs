// src/pipeline/harvest.rs

//! Harvest pass pipeline.
//!
//! Wraps one harvester pass with pruning and the feed refresh decision:
//! the feed is rebuilt whenever the record set changed, either because the
//! pass committed new records or because pruning removed old ones.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::feed::FeedMaterializer;
use crate::models::Config;
use crate::services::{Harvester, RateLimitedFetcher};
use crate::storage::RecordStore;

/// Everything one pass needs, bundled for the scheduler.
pub struct HarvestContext {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    harvester: Harvester,
    materializer: Arc<FeedMaterializer>,
}

impl HarvestContext {
    /// Assemble the pass context.
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<RateLimitedFetcher>,
        store: Arc<dyn RecordStore>,
        materializer: Arc<FeedMaterializer>,
    ) -> Self {
        let harvester = Harvester::new(Arc::clone(&config), fetcher, Arc::clone(&store));
        Self {
            config,
            store,
            harvester,
            materializer,
        }
    }
}

/// Run one harvest pass, prune expired records, and refresh the feed if
/// the record set changed.
pub async fn run_pass(ctx: &HarvestContext) -> Result<()> {
    let outcome = ctx.harvester.run_pass().await?;

    log::info!(
        "Pass complete: {} entries, {} new, {} duplicates, {} parse failures, {} enrich failures, {} commit failures",
        outcome.entries,
        outcome.committed,
        outcome.duplicates,
        outcome.parse_failures,
        outcome.enrich_failures,
        outcome.commit_failures
    );

    let pruned = prune(ctx).await;

    if outcome.committed > 0 || pruned > 0 {
        let records = ctx.store.list_all().await?;
        ctx.materializer.rebuild(&records).await?;
        log::info!("Feed rebuilt with {} records", records.len());
    }

    Ok(())
}

/// Delete records older than the retention horizon. Failures are logged
/// and reported as zero deletions; the pass goes on.
async fn prune(ctx: &HarvestContext) -> u64 {
    let cutoff = Utc::now().timestamp() - ctx.config.store.retention_secs();
    match ctx.store.delete_older_than(cutoff).await {
        Ok(0) => 0,
        Ok(count) => {
            log::info!("Pruned {} expired records", count);
            count
        }
        Err(e) => {
            log::warn!("Pruning failed: {}", e);
            0
        }
    }
}
