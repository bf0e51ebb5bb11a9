// src/services/metadata.rs

//! Meta tag extraction from announcement detail pages.

use std::sync::Arc;

use scraper::Html;

use crate::error::Result;
use crate::models::MetaTag;
use crate::services::RateLimitedFetcher;
use crate::utils::parse_selector;

/// Extracts descriptive meta tags from a fetched page.
///
/// Stateless apart from the shared fetcher; safe to call concurrently for
/// different URLs.
pub struct MetadataExtractor {
    fetcher: Arc<RateLimitedFetcher>,
}

impl MetadataExtractor {
    /// Create a new extractor delegating fetches to the given fetcher.
    pub fn new(fetcher: Arc<RateLimitedFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch a page and collect its meta tags. Fetch errors propagate
    /// unchanged.
    pub async fn extract(&self, url: &str) -> Result<Vec<MetaTag>> {
        let body = self.fetcher.fetch(url).await?;
        collect_meta_tags(&body)
    }
}

/// Collect name/content pairs from every `meta` element in the document.
///
/// The `name` attribute wins; `property` is the fallback for Open Graph
/// style tags. Elements carrying neither are dropped.
fn collect_meta_tags(html: &str) -> Result<Vec<MetaTag>> {
    let document = Html::parse_document(html);
    let meta_sel = parse_selector("meta")?;

    let mut tags = Vec::new();
    for element in document.select(&meta_sel) {
        let value = element.value();
        let Some(name) = value.attr("name").or_else(|| value.attr("property")) else {
            continue;
        };
        tags.push(MetaTag {
            name: name.to_string(),
            content: value.attr("content").unwrap_or("").to_string(),
        });
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html><html><head>
        <meta charset="utf-8">
        <meta name="description" content="Ein Vorfall in Mitte">
        <meta property="og:title" content="Polizeimeldung">
        <meta content="orphan">
        <meta name="empty">
        </head><body>ok</body></html>"#;

    #[test]
    fn collects_name_and_property_tags() {
        let tags = collect_meta_tags(PAGE).unwrap();

        assert!(tags.iter().any(|t| t.name == "description" && t.content == "Ein Vorfall in Mitte"));
        assert!(tags.iter().any(|t| t.name == "og:title" && t.content == "Polizeimeldung"));
    }

    #[test]
    fn suppresses_elements_without_name_or_property() {
        let tags = collect_meta_tags(PAGE).unwrap();
        assert!(tags.iter().all(|t| !t.name.is_empty()));
        assert!(tags.iter().all(|t| t.content != "orphan"));
    }

    #[test]
    fn missing_content_becomes_empty_string() {
        let tags = collect_meta_tags(PAGE).unwrap();
        let empty = tags.iter().find(|t| t.name == "empty").unwrap();
        assert_eq!(empty.content, "");
    }

    #[test]
    fn tolerates_malformed_markup() {
        let tags = collect_meta_tags("<html><head><meta name=\"a\" content=\"b\"><div>").unwrap();
        assert_eq!(tags.len(), 1);
    }
}
