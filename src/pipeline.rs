use indicatif::ProgressBar;
use tracing::warn;

use crate::converter::TextConverter;
use crate::dump::PageRecord;

/// A page ready for the Lua table. `walkthrough` is already neutralized;
/// `title` is raw and gets escaped when the table is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedEntry {
    pub title: String,
    pub walkthrough: String,
}

/// Outcome of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Converted(ConvertedEntry),
    /// The entry carries the `[ERROR: ...]` marker.
    Failed { entry: ConvertedEntry, reason: String },
    /// The converter returned nothing but whitespace.
    Empty,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub pages: usize,
    pub converted: usize,
    pub errors: usize,
    pub dropped: usize,
}

impl RunStats {
    pub fn entries(&self) -> usize {
        self.converted + self.errors
    }
}

/// Collapse `[[`/`]]` so the text cannot close a Lua long bracket, then
/// escape double quotes.
pub fn neutralize(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("[[") {
        out = out.replace("[[", "[");
    }
    while out.contains("]]") {
        out = out.replace("]]", "]");
    }
    out.replace('"', "\\\"")
}

/// Convert one page. Converter failures become an inline `[ERROR: ...]`
/// marker instead of aborting the run.
pub fn convert_page<C: TextConverter>(page: &PageRecord, converter: &C) -> PageOutcome {
    let title = page.title.clone();
    match converter.convert(&page.raw_body) {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                return PageOutcome::Empty;
            }
            PageOutcome::Converted(ConvertedEntry {
                title,
                walkthrough: neutralize(text),
            })
        }
        Err(e) => PageOutcome::Failed {
            entry: ConvertedEntry {
                title,
                walkthrough: neutralize(&format!("[ERROR: {}]", e)),
            },
            reason: e.to_string(),
        },
    }
}

/// Convert every page in order, one at a time. Failures are logged with
/// the progress bar hidden so the two don't interleave.
pub fn convert_pages<C: TextConverter>(
    pages: &[PageRecord],
    converter: &C,
    pb: &ProgressBar,
) -> (Vec<ConvertedEntry>, RunStats) {
    let mut entries = Vec::with_capacity(pages.len());
    let mut stats = RunStats::default();

    for page in pages {
        stats.pages += 1;
        match convert_page(page, converter) {
            PageOutcome::Converted(entry) => {
                stats.converted += 1;
                entries.push(entry);
            }
            PageOutcome::Failed { entry, reason } => {
                pb.suspend(|| warn!("Conversion failed for {:?}: {}", entry.title, reason));
                stats.errors += 1;
                entries.push(entry);
            }
            PageOutcome::Empty => stats.dropped += 1,
        }
        pb.inc(1);
    }

    (entries, stats)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::converter::ConversionError;

    /// Strips category links and keeps everything else.
    struct FakeWiki;

    impl TextConverter for FakeWiki {
        fn convert(&self, markup: &str) -> Result<String, ConversionError> {
            let kept: Vec<&str> = markup
                .split_whitespace()
                .filter(|w| !w.starts_with("[[Category:"))
                .collect();
            Ok(format!("  {}\n", kept.join(" ")))
        }
    }

    /// Canned answers keyed by body; anything else times out.
    struct Scripted(HashMap<&'static str, &'static str>);

    impl TextConverter for Scripted {
        fn convert(&self, markup: &str) -> Result<String, ConversionError> {
            self.0
                .get(markup)
                .map(|s| s.to_string())
                .ok_or(ConversionError::Timeout {
                    program: "pandoc".into(),
                    after: Duration::from_secs(10),
                })
        }
    }

    fn page(title: &str, body: &str) -> PageRecord {
        PageRecord {
            title: title.into(),
            raw_body: body.into(),
        }
    }

    #[test]
    fn category_markup_stripped() {
        let p = page("Vana'diel Overview", "[[Category:Nations]] Some text.");
        let outcome = convert_page(&p, &FakeWiki);
        assert_eq!(
            outcome,
            PageOutcome::Converted(ConvertedEntry {
                title: "Vana'diel Overview".into(),
                walkthrough: "Some text.".into(),
            })
        );
    }

    #[test]
    fn brackets_neutralized() {
        assert_eq!(neutralize("a [[b]] c"), "a [b] c");
        assert_eq!(neutralize("[[[x]]]"), "[x]");
        assert_eq!(neutralize("]]]]]"), "]");
        assert!(!neutralize("[[[[[[ ]]]]]]]").contains("]]"));
    }

    #[test]
    fn quotes_escaped_once() {
        assert_eq!(neutralize(r#"say "hi""#), r#"say \"hi\""#);
    }

    #[test]
    fn empty_conversion_dropped() {
        let conv = Scripted(HashMap::from([("{{stub}}", "  \n ")]));
        assert_eq!(convert_page(&page("Stub", "{{stub}}"), &conv), PageOutcome::Empty);
    }

    #[test]
    fn failure_becomes_marker() {
        let conv = Scripted(HashMap::new());
        match convert_page(&page("Slow", "body"), &conv) {
            PageOutcome::Failed { entry, reason } => {
                assert!(reason.contains("timed out"));
                assert_eq!(entry.title, "Slow");
                assert!(entry.walkthrough.starts_with("[ERROR:"));
                assert!(entry.walkthrough.contains("timed out"));
                assert!(entry.walkthrough.ends_with(']'));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn failures_isolated_and_order_kept() {
        let conv = Scripted(HashMap::from([
            ("one", "First"),
            ("three", "Third"),
            ("four", ""),
            ("five", "Fifth [[link]]"),
        ]));
        let pages = vec![
            page("A", "one"),
            page("B", "two"),
            page("C", "three"),
            page("D", "four"),
            page("E", "five"),
        ];
        let pb = ProgressBar::hidden();
        let (entries, stats) = convert_pages(&pages, &conv, &pb);
        assert_eq!(pb.position(), 5);

        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "E"]);
        assert!(entries[1].walkthrough.starts_with("[ERROR:"));
        assert_eq!(entries[3].walkthrough, "Fifth [link]");
        assert_eq!(
            stats,
            RunStats {
                pages: 5,
                converted: 3,
                errors: 1,
                dropped: 1,
            }
        );
        assert_eq!(stats.entries(), 4);
    }
}
