//! Meta tag value extracted from a detail page.

/// A name/content pair from a page's `<meta>` elements.
///
/// The name comes from the `name` attribute, falling back to `property`
/// for Open Graph style tags. Consumed once to fill a record description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    pub name: String,
    pub content: String,
}
