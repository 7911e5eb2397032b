//! Locates model-supplied quotes inside the source text.
//!
//! Quotes returned by the model rarely agree with the source on trailing
//! punctuation, so matching strips it from the quote, searches literally and
//! case-insensitively, then lets each hit swallow whatever punctuation or
//! closing quote follows it in the source.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Half-open range in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

fn is_quote_char(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

fn is_trailing_punct(ch: char) -> bool {
    matches!(ch, '.' | ',' | ';' | ':' | '-' | '!' | '?') || is_quote_char(ch)
}

/// Trims the quote and drops any trailing run of whitespace, quote marks and
/// terminal punctuation.
pub fn normalize_quote(quote: &str) -> &str {
    quote
        .trim()
        .trim_end_matches(|ch: char| ch.is_whitespace() || is_trailing_punct(ch))
}

/// Maps byte offsets of a `&str` to UTF-16 code-unit offsets and back.
#[derive(Debug, Clone)]
pub struct Utf16Index {
    /// `(byte_offset, utf16_offset)` at every char boundary, plus the end.
    boundaries: Vec<(usize, usize)>,
}

impl Utf16Index {
    pub fn new(text: &str) -> Self {
        let mut boundaries = Vec::with_capacity(text.len() + 1);
        let mut units = 0;
        for (idx, ch) in text.char_indices() {
            boundaries.push((idx, units));
            units += ch.len_utf16();
        }
        boundaries.push((text.len(), units));
        Self { boundaries }
    }

    /// Total length in UTF-16 code units.
    pub fn len_utf16(&self) -> usize {
        self.boundaries.last().map(|(_, u)| *u).unwrap_or(0)
    }

    /// UTF-16 offset of a byte offset. Offsets inside a char snap to its start.
    pub fn to_utf16(&self, byte_offset: usize) -> usize {
        match self.boundaries.binary_search_by_key(&byte_offset, |(b, _)| *b) {
            Ok(pos) => self.boundaries[pos].1,
            Err(pos) => self.boundaries[pos.saturating_sub(1)].1,
        }
    }

    /// Byte offset of a UTF-16 offset. Offsets inside a surrogate pair snap to
    /// the start of the char; offsets past the end clamp to the text length.
    pub fn to_byte(&self, utf16_offset: usize) -> usize {
        match self.boundaries.binary_search_by_key(&utf16_offset, |(_, u)| *u) {
            Ok(pos) => self.boundaries[pos].0,
            Err(pos) => self.boundaries[pos.saturating_sub(1)].0,
        }
    }

    /// Byte range of a UTF-16 span, suitable for slicing the indexed text.
    pub fn byte_range(&self, span: Span) -> std::ops::Range<usize> {
        self.to_byte(span.start)..self.to_byte(span.end)
    }
}

/// Compiled matcher for a single quote.
#[derive(Debug, Clone)]
pub struct QuoteMatcher {
    regex: Option<Regex>,
}

impl QuoteMatcher {
    pub fn new(quote: &str) -> Self {
        let needle = normalize_quote(quote);
        if needle.is_empty() {
            return Self { regex: None };
        }
        let regex = match RegexBuilder::new(&regex::escape(needle))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::debug!(%err, "quote could not be compiled, skipping");
                None
            }
        };
        Self { regex }
    }

    /// Whether the quote had any searchable content after normalisation.
    pub fn is_searchable(&self) -> bool {
        self.regex.is_some()
    }

    /// Byte ranges of every occurrence, with trailing punctuation absorbed.
    pub fn find_byte_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        regex
            .find_iter(text)
            .map(|m| {
                let tail = text[m.end()..]
                    .char_indices()
                    .find(|(_, ch)| !is_trailing_punct(*ch))
                    .map(|(idx, _)| idx)
                    .unwrap_or(text.len() - m.end());
                (m.start(), m.end() + tail)
            })
            .collect()
    }

    /// Spans of every occurrence in UTF-16 code units.
    pub fn find_spans(&self, text: &str, index: &Utf16Index) -> Vec<Span> {
        self.find_byte_ranges(text)
            .into_iter()
            .map(|(start, end)| Span::new(index.to_utf16(start), index.to_utf16(end)))
            .collect()
    }
}

/// Every occurrence of `quote` in `source`, as UTF-16 spans.
pub fn find_quote_spans(source: &str, quote: &str) -> Vec<Span> {
    let matcher = QuoteMatcher::new(quote);
    if !matcher.is_searchable() {
        return Vec::new();
    }
    matcher.find_spans(source, &Utf16Index::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_punctuation_and_quotes() {
        assert_eq!(normalize_quote("  You are wrong.  "), "You are wrong");
        let curly = normalize_quote("\u{201C}Trust me!\u{201D}");
        assert_eq!(curly, "\u{201C}Trust me");
        assert_eq!(normalize_quote("wait -- ?!"), "wait");
        assert_eq!(normalize_quote("...!"), "");
    }

    #[test]
    fn absorbs_trailing_punctuation_in_source() {
        let spans = find_quote_spans("You are wrong. They want chaos.", "You are wrong.");
        assert_eq!(spans, vec![Span::new(0, 14)]);
    }

    #[test]
    fn extension_stops_at_first_non_punctuation() {
        let text = "He said \"leave now!\" and left.";
        let spans = find_quote_spans(text, "leave now");
        assert_eq!(spans.len(), 1);
        let s = spans[0];
        assert_eq!(&text[s.start..s.end], "leave now!\"");
    }

    #[test]
    fn matches_case_insensitively_and_repeatedly() {
        let spans = find_quote_spans("Fear sells. FEAR sells. fear Sells", "fear sells");
        assert_eq!(
            spans,
            vec![Span::new(0, 11), Span::new(12, 23), Span::new(24, 34)]
        );
    }

    #[test]
    fn treats_metacharacters_literally() {
        let spans = find_quote_spans("Is it (really) 100% true? Yes.", "(really) 100%");
        assert_eq!(spans, vec![Span::new(6, 19)]);
    }

    #[test]
    fn matches_inside_longer_words() {
        let spans = find_quote_spans("The resolution passed.", "solution");
        assert_eq!(spans, vec![Span::new(6, 14)]);
    }

    #[test]
    fn blank_or_missing_quotes_yield_nothing() {
        assert!(find_quote_spans("anything", "").is_empty());
        assert!(find_quote_spans("anything", "   \n").is_empty());
        assert!(find_quote_spans("anything", "?!.").is_empty());
        assert!(find_quote_spans("anything", "nothing like it").is_empty());
    }

    #[test]
    fn reports_utf16_offsets() {
        // U+1F600 is two UTF-16 units and four bytes.
        let text = "\u{1F600} caf\u{E9} is bad.";
        let spans = find_quote_spans(text, "is bad");
        assert_eq!(spans, vec![Span::new(8, 15)]);
        let index = Utf16Index::new(text);
        assert_eq!(&text[index.byte_range(spans[0])], "is bad.");
    }

    #[test]
    fn utf16_index_round_trips_boundaries() {
        let text = "a\u{1F600}b";
        let index = Utf16Index::new(text);
        assert_eq!(index.len_utf16(), 4);
        assert_eq!(index.to_utf16(5), 3);
        assert_eq!(index.to_byte(3), 5);
        assert_eq!(index.to_byte(2), 1);
        assert_eq!(index.to_byte(99), text.len());
    }
}
