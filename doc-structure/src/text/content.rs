//! Plain text of a block with a mapping back to source offsets.

use std::ops::Range;

use crate::model::CharRange;
use crate::text::tokenizer::{ContentSpan, Join};

#[derive(Debug, Clone, Copy)]
struct Piece {
    /// Offset of the piece inside the joined text
    plain_start: usize,
    source: CharRange,
    formatted: bool,
}

/// Content spans joined into one string.
///
/// Inline joins add nothing, soft joins a space, hard joins a newline and
/// cell joins `", "`.
/// Every byte of the joined text that came from the source maps back to
/// exactly one source offset; separator bytes map to the nearest piece.
#[derive(Debug, Clone, Default)]
pub struct ContentText {
    text: String,
    pieces: Vec<Piece>,
}

impl ContentText {
    pub fn from_spans(source: &str, spans: &[ContentSpan]) -> Self {
        let mut text = String::new();
        let mut pieces = Vec::with_capacity(spans.len());

        for span in spans.iter().filter(|s| !s.range.is_empty()) {
            if !pieces.is_empty() {
                text.push_str(match span.join {
                    Join::Inline => "",
                    Join::Soft => " ",
                    Join::Hard => "\n",
                    Join::Cell => ", ",
                });
            }
            pieces.push(Piece {
                plain_start: text.len(),
                source: span.range,
                formatted: span.formatted,
            });
            text.push_str(span.range.slice(source));
        }

        Self { text, pieces }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Source range covered by the plain-text range `plain`.
    pub fn source_range(&self, plain: Range<usize>) -> CharRange {
        let start = self.map_start(plain.start);
        let end = self.map_end(plain.end).max(start);
        CharRange::new(start, end)
    }

    /// Whether any emphasised, linked or code text overlaps `plain`.
    pub fn has_formatting(&self, plain: Range<usize>) -> bool {
        self.pieces.iter().any(|piece| {
            let end = piece.plain_start + piece.source.len();
            piece.formatted && piece.plain_start < plain.end && plain.start < end
        })
    }

    /// Source offset of the first source byte at or after `pos`.
    fn map_start(&self, pos: usize) -> usize {
        for piece in &self.pieces {
            let piece_end = piece.plain_start + piece.source.len();
            if pos < piece_end {
                return piece.source.start + pos.saturating_sub(piece.plain_start);
            }
        }
        self.pieces.last().map_or(0, |p| p.source.end)
    }

    /// Source offset just past the last source byte before `pos`.
    fn map_end(&self, pos: usize) -> usize {
        for piece in self.pieces.iter().rev() {
            if pos > piece.plain_start {
                let within = (pos - piece.plain_start).min(piece.source.len());
                return piece.source.start + within;
            }
        }
        self.pieces.first().map_or(0, |p| p.source.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, join: Join) -> ContentSpan {
        ContentSpan::new(CharRange::new(start, end), join)
    }

    #[test]
    fn test_joins_use_separators() {
        let source = "alpha\nbeta\ngamma | delta";
        let spans = [
            span(0, 5, Join::Soft),
            span(6, 10, Join::Soft),
            span(11, 16, Join::Hard),
            span(19, 24, Join::Cell),
        ];
        let content = ContentText::from_spans(source, &spans);
        assert_eq!(content.text(), "alpha beta\ngamma, delta");
    }

    #[test]
    fn test_source_range_maps_across_pieces() {
        let source = "> First line\n> second line.";
        let spans = [span(2, 12, Join::Soft), span(15, 27, Join::Soft)];
        let content = ContentText::from_spans(source, &spans);
        assert_eq!(content.text(), "First line second line.");

        let whole = content.source_range(0..content.text().len());
        assert_eq!(whole, CharRange::new(2, 27));
        assert_eq!(whole.slice(source), "First line\n> second line.");

        let second = content.source_range(11..23);
        assert_eq!(second.slice(source), "second line.");
    }

    #[test]
    fn test_positions_inside_separators() {
        let source = "one two";
        let spans = [span(0, 3, Join::Soft), span(4, 7, Join::Soft)];
        let content = ContentText::from_spans(source, &spans);
        // Byte 3 is the joining space: a start there moves forward, an end
        // there stays on the previous piece.
        assert_eq!(content.map_start(3), 4);
        assert_eq!(content.map_end(3), 3);
    }

    #[test]
    fn test_inline_joins_and_formatting() {
        let source = "Some **bold** text. Plain one.";
        let spans = [
            span(0, 5, Join::Hard),
            ContentSpan::new(CharRange::new(7, 11), Join::Inline).with_formatting(true),
            span(13, 30, Join::Inline),
        ];
        let content = ContentText::from_spans(source, &spans);
        assert_eq!(content.text(), "Some bold text. Plain one.");
        assert!(content.has_formatting(0..15));
        assert!(!content.has_formatting(16..26));
        assert_eq!(content.source_range(5..9).slice(source), "bold");
    }

    #[test]
    fn test_empty_spans_are_skipped() {
        let content = ContentText::from_spans("abc", &[span(1, 1, Join::Hard)]);
        assert!(content.is_empty());
        assert_eq!(content.source_range(0..0), CharRange::new(0, 0));
    }
}
