// src/feed/render.rs

//! Feed document rendering.
//!
//! RSS 2.0 and Atom 1.0 are written with `quick_xml`; the JSON Feed is a
//! straight serde serialization. All three are rendered from the same
//! channel metadata and item list.

use chrono::DateTime;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::feed::{FeedChannel, FeedItem};

/// Render an RSS 2.0 document.
pub fn rss(channel: &FeedChannel, items: &[FeedItem]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        writer.write_event(Event::Start(guid))?;
        writer.write_event(Event::Text(BytesText::new(&item.id)))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        write_text_element(&mut writer, "title", &item.title)?;
        write_text_element(&mut writer, "link", &item.link)?;
        write_text_element(&mut writer, "description", &item.description)?;
        write_text_element(
            &mut writer,
            "author",
            &format!("{} ({})", channel.author_email, channel.author_name),
        )?;
        write_text_element(&mut writer, "pubDate", &rfc2822(item.published))?;

        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    into_string(writer)
}

/// Render an Atom 1.0 document.
pub fn atom(channel: &FeedChannel, items: &[FeedItem]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut feed_start = BytesStart::new("feed");
    feed_start.push_attribute(("xmlns", "http://www.w3.org/2005/Atom"));
    writer.write_event(Event::Start(feed_start))?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "id", &channel.link)?;
    write_text_element(&mut writer, "subtitle", &channel.description)?;

    // The feed-level updated element reflects the newest item.
    let updated = items.iter().map(|i| i.published).max().unwrap_or(0);
    write_text_element(&mut writer, "updated", &rfc3339(updated))?;

    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", "alternate"));
    link.push_attribute(("href", channel.link.as_str()));
    writer.write_event(Event::Empty(link))?;

    writer.write_event(Event::Start(BytesStart::new("author")))?;
    write_text_element(&mut writer, "name", &channel.author_name)?;
    write_text_element(&mut writer, "email", &channel.author_email)?;
    writer.write_event(Event::End(BytesEnd::new("author")))?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("entry")))?;

        write_text_element(&mut writer, "id", &item.id)?;
        write_text_element(&mut writer, "title", &item.title)?;

        let mut entry_link = BytesStart::new("link");
        entry_link.push_attribute(("rel", "alternate"));
        entry_link.push_attribute(("href", item.link.as_str()));
        writer.write_event(Event::Empty(entry_link))?;

        write_text_element(&mut writer, "published", &rfc3339(item.published))?;
        write_text_element(&mut writer, "updated", &rfc3339(item.published))?;
        write_text_element(&mut writer, "summary", &item.description)?;

        writer.write_event(Event::End(BytesEnd::new("entry")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("feed")))?;

    into_string(writer)
}

/// Render a JSON Feed 1.1 document.
pub fn json_feed(channel: &FeedChannel, items: &[FeedItem]) -> Result<String> {
    let doc = JsonFeedDoc {
        version: "https://jsonfeed.org/version/1.1",
        title: &channel.title,
        home_page_url: &channel.link,
        description: &channel.description,
        authors: vec![JsonAuthor {
            name: &channel.author_name,
        }],
        items: items
            .iter()
            .map(|item| JsonFeedItem {
                id: &item.id,
                url: &item.link,
                title: &item.title,
                content_text: &item.description,
                date_published: rfc3339(item.published),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[derive(Serialize)]
struct JsonFeedDoc<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    description: &'a str,
    authors: Vec<JsonAuthor<'a>>,
    items: Vec<JsonFeedItem<'a>>,
}

#[derive(Serialize)]
struct JsonAuthor<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct JsonFeedItem<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    content_text: &'a str,
    date_published: String,
}

/// Write `<name>text</name>` with sanitized text content.
fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&sanitize_text(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Strip control characters that are invalid in XML. Tab, LF and CR stay.
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            let code = c as u32;
            code == 0x09 || code == 0x0A || code == 0x0D || code >= 0x20
        })
        .collect()
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(|e| AppError::parse("feed render", e))
}

fn rfc2822(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_default()
}

fn rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> FeedChannel {
        FeedChannel {
            title: "Berliner Polizeimeldungen".to_string(),
            link: "https://www.berlin.de/polizei/polizeimeldungen/".to_string(),
            description: "Ein Feed für Berliner Polizeimeldungen".to_string(),
            author_name: "Presseabteilung".to_string(),
            author_email: "pressestelle@polizei.berlin.de".to_string(),
        }
    }

    fn item() -> FeedItem {
        FeedItem {
            id: "abcd1234abcd1234".to_string(),
            title: "Einbruch <mit Sonderzeichen> & Umlauten".to_string(),
            link: "https://www.berlin.de/x".to_string(),
            description: "Desc\n\nLocation: Mitte".to_string(),
            published: 1588334400,
        }
    }

    /// Walk the document with the pull parser; any malformed XML errors out.
    fn assert_well_formed(xml: &str) {
        let mut reader = quick_xml::Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed XML: {e}"),
            }
        }
    }

    #[test]
    fn rss_contains_item_fields_and_escapes() {
        let xml = rss(&channel(), &[item()]).unwrap();
        assert_well_formed(&xml);
        assert!(xml.contains(r#"<rss version="2.0">"#));
        assert!(xml.contains(r#"<guid isPermaLink="false">abcd1234abcd1234</guid>"#));
        assert!(xml.contains("&lt;mit Sonderzeichen&gt; &amp; Umlauten"));
        assert!(xml.contains("Location: Mitte"));
        assert!(xml.contains("pressestelle@polizei.berlin.de (Presseabteilung)"));
    }

    #[test]
    fn rss_pubdate_matches_occurrence_time() {
        let xml = rss(&channel(), &[item()]).unwrap();
        let expected = DateTime::from_timestamp(1588334400, 0).unwrap().to_rfc2822();
        assert!(xml.contains(&expected));
    }

    #[test]
    fn atom_carries_entry_id_and_published() {
        let xml = atom(&channel(), &[item()]).unwrap();
        assert_well_formed(&xml);
        assert!(xml.contains(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#));
        assert!(xml.contains("<id>abcd1234abcd1234</id>"));
        let expected = DateTime::from_timestamp(1588334400, 0).unwrap().to_rfc3339();
        assert!(xml.contains(&format!("<published>{expected}</published>")));
    }

    #[test]
    fn empty_feeds_are_still_well_formed() {
        assert_well_formed(&rss(&channel(), &[]).unwrap());
        assert_well_formed(&atom(&channel(), &[]).unwrap());
        let json: serde_json::Value =
            serde_json::from_str(&json_feed(&channel(), &[]).unwrap()).unwrap();
        assert_eq!(json["version"], "https://jsonfeed.org/version/1.1");
    }

    #[test]
    fn json_feed_round_trips_item_fields() {
        let json: serde_json::Value =
            serde_json::from_str(&json_feed(&channel(), &[item()]).unwrap()).unwrap();
        assert_eq!(json["items"][0]["id"], "abcd1234abcd1234");
        assert_eq!(json["items"][0]["url"], "https://www.berlin.de/x");
        let expected = DateTime::from_timestamp(1588334400, 0).unwrap().to_rfc3339();
        assert_eq!(json["items"][0]["date_published"], expected.as_str());
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_text("a\u{0}b\tc\n"), "ab\tc\n");
    }
}
