//! Chapter boundary detection strategies.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParseConfig;
use crate::text::{Join, Token, TokenKind};

/// Explicit chapter markers recognised in plain paragraphs.
static CHAPTER_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(?:Chapter|CHAPTER)\s+(?:\d+|[IVXLCDMivxlcdm]+|[A-Z][a-z]+)\b",
        r"^(?:Part|PART|Book|BOOK)\s+(?:\d+|[IVXLCDM]+|[A-Z][a-z]+)\b",
        r"^(?:Section|SECTION)\s+\d+\b",
        r"^(?:Prologue|PROLOGUE|Epilogue|EPILOGUE|Preface|PREFACE|Introduction|INTRODUCTION|Afterword|AFTERWORD)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid chapter marker regex"))
    .collect()
});

/// Longest paragraph that can still be a chapter marker.
const MAX_MARKER_LEN: usize = 100;

/// Everything a strategy may look at.
pub struct ChapterContext<'a> {
    pub source: &'a str,
    pub tokens: &'a [Token],
    /// Token holding the document title, if any
    pub title_index: Option<usize>,
}

/// A token that opens a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBoundary {
    pub token_index: usize,
    pub title: String,
    pub level: u8,
}

/// Decides which tokens open chapters.
///
/// The builder sorts and deduplicates the returned boundaries, so
/// implementations may return them in any order.
pub trait ChapterStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn boundaries(&self, ctx: &ChapterContext<'_>) -> Vec<ChapterBoundary>;
}

/// Headings at one of the configured levels open chapters.
#[derive(Debug, Clone)]
pub struct HeadingLevelStrategy {
    levels: Vec<u8>,
}

impl HeadingLevelStrategy {
    pub fn new(levels: impl Into<Vec<u8>>) -> Self {
        Self {
            levels: levels.into(),
        }
    }

    pub fn from_config(config: &ParseConfig) -> Self {
        Self::new(config.chapter_header_levels.clone())
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }
}

impl ChapterStrategy for HeadingLevelStrategy {
    fn name(&self) -> &'static str {
        "heading-level"
    }

    fn boundaries(&self, ctx: &ChapterContext<'_>) -> Vec<ChapterBoundary> {
        ctx.tokens
            .iter()
            .enumerate()
            .filter_map(|(index, token)| match &token.kind {
                TokenKind::Heading { level, text } if self.levels.contains(level) => {
                    Some(ChapterBoundary {
                        token_index: index,
                        title: text.clone(),
                        level: *level,
                    })
                }
                _ => None,
            })
            .collect()
    }
}

/// Heading levels plus standalone lines such as `Chapter 3` or `Prologue`.
///
/// Useful for manuscripts converted from plain text, where chapter titles
/// were never marked up as headings.
#[derive(Debug, Clone)]
pub struct PatternStrategy {
    headings: HeadingLevelStrategy,
}

impl PatternStrategy {
    pub fn new(levels: impl Into<Vec<u8>>) -> Self {
        Self {
            headings: HeadingLevelStrategy::new(levels),
        }
    }

    pub fn from_config(config: &ParseConfig) -> Self {
        Self {
            headings: HeadingLevelStrategy::from_config(config),
        }
    }

    /// Level assigned to chapters found through a marker line.
    fn marker_level(&self) -> u8 {
        self.headings.levels().iter().copied().min().unwrap_or(1)
    }
}

/// Text of a single-line paragraph that reads as a chapter marker.
fn marker_title(source: &str, token: &Token) -> Option<String> {
    let (first, last) = match (token.content.first(), token.content.last()) {
        (Some(first), Some(last)) if token.kind == TokenKind::Paragraph => (first, last),
        _ => return None,
    };
    // Single line only
    if token.content[1..].iter().any(|span| span.join != Join::Inline) {
        return None;
    }
    let text = first.range.cover(&last.range).slice(source).trim();
    if text.len() > MAX_MARKER_LEN {
        return None;
    }
    CHAPTER_MARKERS
        .iter()
        .any(|re| re.is_match(text))
        .then(|| text.to_string())
}

impl ChapterStrategy for PatternStrategy {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn boundaries(&self, ctx: &ChapterContext<'_>) -> Vec<ChapterBoundary> {
        let level = self.marker_level();
        let mut boundaries = self.headings.boundaries(ctx);
        boundaries.extend(ctx.tokens.iter().enumerate().filter_map(|(index, token)| {
            marker_title(ctx.source, token).map(|title| ChapterBoundary {
                token_index: index,
                title,
                level,
            })
        }));
        boundaries
    }
}
