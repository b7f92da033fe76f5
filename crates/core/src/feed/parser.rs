use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::{FeedEntry, FeedError};

/// Parse an RSS 2.0 or Atom document into raw entries.
///
/// A syntax error after at least one complete entry keeps what was read;
/// an error before any entry fails the whole document.
pub fn parse_feed(content: &str) -> Result<Vec<FeedEntry>, FeedError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = local_name(e);
                if tag == "item" || tag == "entry" {
                    current = Some(FeedEntry::default());
                } else if let Some(entry) = current.as_mut() {
                    apply_attributes(entry, &tag, e);
                }
                current_tag = tag;
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    apply_attributes(entry, &local_name(e), e);
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "item" || tag == "entry" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Text(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    let text = e.unescape().unwrap_or_default().to_string();
                    apply_text(entry, &current_tag, text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    apply_text(entry, &current_tag, text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if entries.is_empty() {
                    return Err(FeedError::Parse(format!(
                        "at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
                warn!(error = %e, parsed = entries.len(), "Feed document truncated");
                break;
            }
            _ => {}
        }
    }

    debug!(entries = entries.len(), "Parsed feed document");
    Ok(entries)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn apply_text(entry: &mut FeedEntry, tag: &str, text: String) {
    if text.is_empty() {
        return;
    }
    let slot = match tag {
        "title" => &mut entry.title,
        "link" => &mut entry.link,
        "guid" => &mut entry.guid,
        "id" => &mut entry.id,
        "pubDate" | "published" | "updated" | "date" => &mut entry.published,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(text);
    }
}

/// Atom `<link href>` and RSS `<enclosure url>`.
fn apply_attributes(entry: &mut FeedEntry, tag: &str, e: &BytesStart<'_>) {
    let (wanted, slot): (&[u8], &mut Option<String>) = match tag {
        "link" => (&b"href"[..], &mut entry.link),
        "enclosure" => (&b"url"[..], &mut entry.enclosure),
        _ => return,
    };
    if slot.is_some() {
        return;
    }
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == wanted {
            if let Ok(value) = attr.unescape_value() {
                *slot = Some(value.to_string());
            }
        }
    }
}
