// src/services/harvester.rs

//! Harvest pass orchestration.
//!
//! One pass walks the listing page, computes fingerprints, gates
//! duplicates, enriches accepted entries with detail-page descriptions,
//! and commits the batch to the store. Entry-level failures are contained
//! within the pass; only a listing fetch or page-level parse failure
//! aborts it.

use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use scraper::Html;

use crate::error::Result;
use crate::models::{Config, HarvestConfig, Record};
use crate::services::{DuplicateGate, MetadataExtractor, RateLimitedFetcher};
use crate::storage::RecordStore;
use crate::utils::{normalize_whitespace, parse_selector, resolve_url};

/// Summary of one harvest pass.
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    /// Listing entries seen
    pub entries: usize,
    /// Entries skipped because a cell failed to parse
    pub parse_failures: usize,
    /// Entries skipped by the duplicate gate
    pub duplicates: usize,
    /// Accepted entries whose description enrichment failed
    pub enrich_failures: usize,
    /// Records newly written to the store
    pub committed: usize,
    /// Accepted records the store rejected
    pub commit_failures: usize,
}

/// Service running harvest passes against the configured listing page.
pub struct Harvester {
    config: Arc<Config>,
    fetcher: Arc<RateLimitedFetcher>,
    extractor: MetadataExtractor,
    gate: DuplicateGate,
    store: Arc<dyn RecordStore>,
}

impl Harvester {
    /// Create a new harvester.
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<RateLimitedFetcher>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            config,
            extractor: MetadataExtractor::new(Arc::clone(&fetcher)),
            gate: DuplicateGate::new(Arc::clone(&store)),
            fetcher,
            store,
        }
    }

    /// Run one complete fetch-parse-gate-enrich-commit cycle.
    pub async fn run_pass(&self) -> Result<HarvestOutcome> {
        let listing_url = &self.config.harvest.listing_url;
        log::info!("Visiting {}", listing_url);

        let html = self.fetcher.fetch(listing_url).await?;
        let (candidates, parse_failures) = parse_listing(&html, &self.config.harvest)?;

        let mut outcome = HarvestOutcome {
            entries: candidates.len() + parse_failures,
            parse_failures,
            ..HarvestOutcome::default()
        };

        // Gate sequentially so every check observes earlier acceptances.
        let mut batch: Vec<Record> = Vec::new();
        for candidate in candidates {
            if self.gate.is_duplicate(&candidate, &batch).await {
                outcome.duplicates += 1;
                continue;
            }
            batch.push(candidate);
        }

        // Enrich accepted entries, preserving listing order.
        let concurrency = self.config.harvest.max_concurrent.max(1);
        let enriched: Vec<(Record, bool)> = stream::iter(batch)
            .map(|record| self.enrich(record))
            .buffered(concurrency)
            .collect()
            .await;

        for (record, failed) in &enriched {
            if *failed {
                outcome.enrich_failures += 1;
                log::warn!("No description extracted for {}", record.link);
            }
        }

        for (record, _) in enriched {
            match self.store.insert(&record).await {
                Ok(()) => outcome.committed += 1,
                Err(e) if e.is_unique_violation() => {
                    outcome.commit_failures += 1;
                    log::warn!(
                        "Record {} lost the insert race, dropping: {}",
                        record.fingerprint,
                        e
                    );
                }
                Err(e) => {
                    outcome.commit_failures += 1;
                    log::warn!("Failed to store record {}: {}", record.fingerprint, e);
                }
            }
        }

        Ok(outcome)
    }

    /// Fill the record description from the detail page's meta tags.
    ///
    /// Extraction failure keeps the record with its placeholder description;
    /// the returned flag reports whether enrichment failed.
    async fn enrich(&self, mut record: Record) -> (Record, bool) {
        match self.extractor.extract(&record.link).await {
            Ok(tags) => {
                if let Some(tag) = tags.into_iter().find(|t| t.name == "description") {
                    record.description = tag.content;
                }
                (record, false)
            }
            Err(e) => {
                log::warn!("Error extracting meta tags for {}: {}", record.link, e);
                (record, true)
            }
        }
    }
}

/// Parse the listing page into candidate records.
///
/// Returns the candidates in listing order together with the number of
/// entries skipped over malformed cells. Selector or base URL problems are
/// page-level errors and abort the pass.
fn parse_listing(html: &str, config: &HarvestConfig) -> Result<(Vec<Record>, usize)> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector(&config.selectors.row_selector)?;
    let date_sel = parse_selector(&config.selectors.date_selector)?;
    let title_sel = parse_selector(&config.selectors.title_selector)?;
    let category_sel = parse_selector(&config.selectors.category_selector)?;
    let base_url = url::Url::parse(&config.base_url)?;

    let mut candidates = Vec::new();
    let mut failures = 0;

    for row in document.select(&row_sel) {
        let raw_date = row
            .select(&date_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let raw_date = normalize_whitespace(&raw_date);

        let occurred_at = match NaiveDateTime::parse_from_str(&raw_date, &config.date_format) {
            Ok(dt) => dt.and_utc().timestamp(),
            Err(e) => {
                failures += 1;
                log::warn!("Error parsing date '{}': {}", raw_date, e);
                continue;
            }
        };

        let Some(title_elem) = row.select(&title_sel).next() else {
            failures += 1;
            log::warn!("Listing entry without a title element, skipping");
            continue;
        };
        let title = normalize_whitespace(&title_elem.text().collect::<String>());
        if title.is_empty() {
            failures += 1;
            continue;
        }

        let raw_link = title_elem
            .value()
            .attr(&config.selectors.link_attr)
            .unwrap_or("");
        let link = resolve_url(&base_url, raw_link);

        let raw_location = row
            .select(&category_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let raw_location = normalize_whitespace(&raw_location);
        let location = raw_location
            .strip_prefix(config.location_prefix.trim_end())
            .map(|s| s.trim_start().to_string())
            .unwrap_or(raw_location);

        candidates.push(Record::new(title, link, location, occurred_at));
    }

    Ok((candidates, failures))
}
