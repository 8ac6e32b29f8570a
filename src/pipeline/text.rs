//! Deterministic cleanup of extracted page text.
//!
//! Both sources of text need the same treatment: pdfium's text layer comes
//! back with CRLF line breaks and stray zero-width characters, tesseract
//! emits form feeds and runs of blank lines. Each rule is a pure
//! `&str → String` pass so they can be tested and reordered independently.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF / CR / form feed → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 3. Trim trailing whitespace per line
//! 4. Collapse 3+ consecutive blank lines down to 2
//! 5. Trim the whole text and end it with exactly one newline

use crate::config::PageSeparator;
use crate::output::PageText;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to raw extracted text.
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Returns `true` when the text carries no real content.
///
/// Scanned pages often have a text layer made of a handful of stray glyphs;
/// fewer than three alphanumeric characters counts as blank.
pub fn is_blank(text: &str) -> bool {
    text.chars().filter(|c| c.is_alphanumeric()).take(3).count() < 3
}

/// Join per-page text into one document using `separator`.
///
/// Pages are emitted in the order given; callers pass them sorted by page.
pub fn assemble_text<'a>(
    pages: impl IntoIterator<Item = &'a PageText>,
    separator: &PageSeparator,
) -> String {
    let mut out = String::new();
    for (i, page) in pages.into_iter().enumerate() {
        if i == 0 {
            if let Some(lead) = separator.leading(page.page_num) {
                out.push_str(&lead);
            }
        } else {
            // Each page already ends with '\n'; the separator supplies the gap.
            let trimmed = out.trim_end_matches('\n').len();
            out.truncate(trimmed);
            out.push_str(&separator.render(page.page_num));
        }
        out.push_str(&page.text);
    }
    ensure_final_newline(&out)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Ensure single final newline ──────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TextSource;

    fn pt(page_num: usize, text: &str) -> PageText {
        PageText {
            page_num,
            text: text.to_string(),
            source: TextSource::TextLayer,
        }
    }

    #[test]
    fn clean_normalises_line_endings_and_form_feeds() {
        assert_eq!(clean_text("a\r\nb\rc\u{000C}d"), "a\nb\nc\nd\n");
    }

    #[test]
    fn clean_strips_invisible_and_trailing_space() {
        assert_eq!(clean_text("\u{FEFF}Name:\u{200B} Abebe   \n"), "Name: Abebe\n");
    }

    #[test]
    fn clean_collapses_blank_lines() {
        let cleaned = clean_text("one\n\n\n\n\n\ntwo");
        assert_eq!(cleaned, "one\n\n\ntwo\n");
    }

    #[test]
    fn clean_empty_is_single_newline() {
        assert_eq!(clean_text("  \n \r\n"), "\n");
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank(" . , \n"));
        assert!(is_blank("a -"));
        assert!(!is_blank("Date of Issue"));
    }

    #[test]
    fn assemble_with_page_headers() {
        let pages = [pt(1, "first\n"), pt(3, "third\n")];
        let out = assemble_text(pages.iter(), &PageSeparator::PageHeader);
        assert_eq!(out, "--- page 1 ---\nfirst\n\n--- page 3 ---\nthird\n");
    }

    #[test]
    fn assemble_with_no_separator() {
        let pages = [pt(1, "a\n"), pt(2, "b\n")];
        let out = assemble_text(pages.iter(), &PageSeparator::None);
        assert_eq!(out, "a\n\nb\n");
    }
}
