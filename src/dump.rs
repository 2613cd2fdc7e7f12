use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One `<page>` of a wiki export that has a title and a non-blank body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub title: String,
    pub raw_body: String,
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to read dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("malformed XML: {0}")]
    Structure(String),
}

/// Read a wiki export from disk and extract its pages.
pub fn load_pages(path: &Path) -> Result<Vec<PageRecord>, DumpError> {
    let xml = std::fs::read_to_string(path)?;
    let pages = parse_pages(&xml)?;
    info!("Loaded {} pages with text from {}", pages.len(), path.display());
    Ok(pages)
}

/// Which child of the current page we are collecting text for.
#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Text,
}

#[derive(Default)]
struct PartialPage {
    title: Option<String>,
    text: Option<String>,
}

/// Parse an export document, keeping document order.
///
/// Pages without a `text` child, or whose text is only whitespace, are
/// skipped. So are pages without a usable title.
pub fn parse_pages(xml: &str) -> Result<Vec<PageRecord>, DumpError> {
    let mut reader = Reader::from_str(xml);
    let mut pages = Vec::new();
    let mut current: Option<PartialPage> = None;
    let mut field: Option<Field> = None;
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| DumpError::Xml {
            position: reader.error_position(),
            message: e.to_string(),
        })?;

        if depth == 0 {
            check_outside_root(&event, saw_root)?;
        }

        match event {
            Event::Start(e) => {
                depth += 1;
                saw_root = true;
                match local_name(&e).as_slice() {
                    b"page" => current = Some(PartialPage::default()),
                    b"title" => field = start_field(current.as_ref(), Field::Title, &mut buf),
                    b"text" => field = start_field(current.as_ref(), Field::Text, &mut buf),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                // <text/> and <title/> are present but empty
                if let Some(page) = current.as_mut() {
                    match local_name(&e).as_slice() {
                        b"title" if page.title.is_none() => page.title = Some(String::new()),
                        b"text" if page.text.is_none() => page.text = Some(String::new()),
                        _ => {}
                    }
                }
            }
            Event::Text(e) if field.is_some() => {
                let text = e.unescape().map_err(|e| DumpError::Xml {
                    position: reader.buffer_position(),
                    message: e.to_string(),
                })?;
                buf.push_str(&text);
            }
            Event::CData(e) if field.is_some() => {
                buf.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"title" if field == Some(Field::Title) => {
                        if let Some(page) = current.as_mut() {
                            page.title = Some(std::mem::take(&mut buf));
                        }
                        field = None;
                    }
                    b"text" if field == Some(Field::Text) => {
                        if let Some(page) = current.as_mut() {
                            page.text = Some(std::mem::take(&mut buf));
                        }
                        field = None;
                    }
                    b"page" => {
                        if let Some(page) = current.take().and_then(finish_page) {
                            pages.push(page);
                        }
                        field = None;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(DumpError::Structure("document has no root element".into()));
    }
    if depth != 0 {
        return Err(DumpError::Structure(format!(
            "document ended with {} unclosed element(s)",
            depth
        )));
    }

    Ok(pages)
}

/// Between elements at the top level only whitespace, comments, the
/// declaration and a doctype may appear, and only one root element.
fn check_outside_root(event: &Event, saw_root: bool) -> Result<(), DumpError> {
    let stray = match event {
        Event::Start(_) | Event::Empty(_) if saw_root => "a second root element",
        Event::Text(t) if !t.iter().all(|b| b.is_ascii_whitespace()) => "text outside the root element",
        Event::CData(_) => "CDATA outside the root element",
        _ => return Ok(()),
    };
    Err(DumpError::Structure(format!("document has {}", stray)))
}

fn local_name(e: &BytesStart) -> Vec<u8> {
    e.local_name().as_ref().to_vec()
}

/// Only the first `title`/`text` inside a page is collected.
fn start_field(page: Option<&PartialPage>, want: Field, buf: &mut String) -> Option<Field> {
    let page = page?;
    let taken = match want {
        Field::Title => page.title.is_some(),
        Field::Text => page.text.is_some(),
    };
    if taken {
        return None;
    }
    buf.clear();
    Some(want)
}

fn finish_page(page: PartialPage) -> Option<PageRecord> {
    let title = page.title.as_deref().map(str::trim).unwrap_or_default();

    let raw_body = match page.text {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            debug!("Skipping page without text: {:?}", title);
            return None;
        }
    };

    if title.is_empty() {
        warn!("Skipping page with text but no title");
        return None;
    }

    Some(PageRecord {
        title: title.to_string(),
        raw_body,
    })
}

// ── Tests ──
