//! Sentence segmentation.
//!
//! A boundary is the end of a pattern match that is followed by whitespace
//! and then an uppercase letter, optionally behind opening quotes or
//! brackets. Newlines in the joined block text are hard boundaries.

use std::collections::HashSet;
use std::ops::Range;

use regex::Regex;

use crate::config::ParseConfig;
use crate::error::{Result, StructureError};

/// Characters allowed between a boundary and the capital that follows it.
const OPENERS: &[char] = &['"', '\'', '“', '‘', '(', '['];

/// Count words the way every aggregate in the tree does.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    boundaries: Vec<Regex>,
    /// Lowercased, without trailing periods
    abbreviations: HashSet<String>,
}

impl SentenceSegmenter {
    pub fn new<A, P>(abbreviations: &[A], patterns: &[P]) -> Result<Self>
    where
        A: AsRef<str>,
        P: AsRef<str>,
    {
        let boundaries = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    StructureError::InvalidConfig(format!(
                        "invalid sentence boundary pattern {:?}: {}",
                        p.as_ref(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let abbreviations = abbreviations
            .iter()
            .map(|a| a.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();

        Ok(Self {
            boundaries,
            abbreviations,
        })
    }

    pub fn from_config(config: &ParseConfig) -> Result<Self> {
        Self::new(
            config.abbreviations.as_slice(),
            config.sentence_boundary_patterns.as_slice(),
        )
    }

    /// Split `text` into trimmed, non-empty sentence ranges.
    pub fn split(&self, text: &str) -> Vec<Range<usize>> {
        let mut sentences = Vec::new();
        let mut line_start = 0;
        for line in text.split('\n') {
            self.split_line(line, line_start, &mut sentences);
            line_start += line.len() + 1;
        }
        sentences
    }

    fn split_line(&self, line: &str, offset: usize, out: &mut Vec<Range<usize>>) {
        let mut cuts: Vec<usize> = self
            .boundaries
            .iter()
            .flat_map(|re| re.find_iter(line))
            .filter(|m| m.end() > m.start() && self.is_boundary(line, m.start(), m.end()))
            .map(|m| m.end())
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut start = 0;
        for cut in cuts.into_iter().chain(std::iter::once(line.len())) {
            if cut <= start {
                continue;
            }
            push_trimmed(line, start..cut, offset, out);
            start = cut;
        }
    }

    fn is_boundary(&self, line: &str, start: usize, end: usize) -> bool {
        let rest = &line[end..];
        let after = rest.trim_start();
        if after.len() == rest.len() {
            return false;
        }
        let mut next = after.chars().skip_while(|c| OPENERS.contains(c));
        if !next.next().is_some_and(char::is_uppercase) {
            return false;
        }
        !(line[start..end].starts_with('.') && self.ends_with_abbreviation(&line[..start]))
    }

    /// The word before a period is a known abbreviation, a lone initial or
    /// dotted initials such as `U.S`.
    fn ends_with_abbreviation(&self, before: &str) -> bool {
        let word = before
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() {
            return false;
        }
        let mut chars = word.chars();
        if let (Some(only), None) = (chars.next(), chars.next()) {
            if only.is_alphabetic() {
                return true;
            }
        }
        if word.contains('.') && word.split('.').all(is_initial) {
            return true;
        }
        self.abbreviations.contains(&word.to_lowercase())
    }
}

fn is_initial(part: &str) -> bool {
    let mut chars = part.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

fn push_trimmed(line: &str, piece: Range<usize>, offset: usize, out: &mut Vec<Range<usize>>) {
    let raw = &line[piece.clone()];
    let body = raw.trim();
    if count_words(body) == 0 {
        return;
    }
    let start = offset + piece.start + (raw.len() - raw.trim_start().len());
    out.push(start..start + body.len());
}
