//! The document tree handed to the narration pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scoring::ConfidenceBreakdown;

/// Title used when the source has no usable level-1 heading.
pub const UNTITLED_DOCUMENT: &str = "Untitled Document";

/// Free-form metadata attached to a document.
pub type CustomMetadata = BTreeMap<String, serde_json::Value>;

/// Half-open `[start, end)` byte range into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

impl CharRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {} after end {}", start, end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &CharRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest range covering both.
    pub fn cover(&self, other: &CharRange) -> CharRange {
        CharRange::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice the source this range was taken from.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Kind of block a paragraph was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Heading,
    Code,
    Blockquote,
    List,
    Table,
}

/// Index-based locator of a paragraph or sentence within the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPosition {
    pub chapter_index: usize,
    pub paragraph_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_index: Option<usize>,
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub id: String,
    pub text: String,
    pub word_count: usize,
    /// Seconds of narration
    pub estimated_duration: f64,
    /// The source carried inline markup (emphasis, code, links)
    pub has_formatting: bool,
    pub char_range: CharRange,
    pub document_position: DocumentPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub id: String,
    pub content_type: ContentType,
    pub char_range: CharRange,
    pub confidence: f64,
    pub include_in_audio: bool,
    pub sentences: Vec<Sentence>,
    pub word_count: usize,
    pub estimated_duration: f64,
    pub document_position: DocumentPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    /// Heading level 1-6
    pub level: u8,
    pub position: usize,
    pub depth: usize,
    pub char_range: CharRange,
    pub paragraphs: Vec<Paragraph>,
    pub word_count: usize,
    /// Seconds of narration across audio-included paragraphs
    pub estimated_duration: f64,
    /// Mean paragraph confidence, 0 for an empty chapter
    pub confidence: f64,
}

impl Chapter {
    pub fn sentence_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.sentences.len()).sum()
    }

    pub fn has_content_type(&self, content_type: ContentType) -> bool {
        self.paragraphs
            .iter()
            .any(|p| p.content_type == content_type)
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    /// Words across every content block, including blocks outside chapters
    pub word_count: usize,
    #[serde(default)]
    pub custom_metadata: CustomMetadata,
}

impl DocumentMetadata {
    pub fn has_title(&self) -> bool {
        let title = self.title.trim();
        !title.is_empty() && title != UNTITLED_DOCUMENT
    }
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            title: UNTITLED_DOCUMENT.to_string(),
            word_count: 0,
            custom_metadata: CustomMetadata::new(),
        }
    }
}

/// Markup problem absorbed while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnterminatedCodeFence,
    MalformedTable,
    BadListIndentation,
    UnassignedContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingIssue {
    pub kind: IssueKind,
    pub message: String,
    pub char_range: CharRange,
}

impl ProcessingIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>, char_range: CharRange) -> Self {
        Self {
            kind,
            message: message.into(),
            char_range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetrics {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Source length in bytes
    pub source_length: usize,
    pub token_count: usize,
    /// Blocks that appeared before the first chapter
    pub unassigned_blocks: usize,
    pub processing_errors: Vec<ProcessingIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStructure {
    pub metadata: DocumentMetadata,
    pub chapters: Vec<Chapter>,
    pub total_word_count: usize,
    pub total_chapters: usize,
    pub total_paragraphs: usize,
    pub total_sentences: usize,
    pub confidence: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    /// Seconds of narration for the whole document
    pub estimated_total_duration: f64,
    pub processing_metrics: ProcessingMetrics,
}

impl DocumentStructure {
    /// Assemble a document, deriving every aggregate from the chapter tree.
    pub fn assemble(
        metadata: DocumentMetadata,
        chapters: Vec<Chapter>,
        confidence_breakdown: ConfidenceBreakdown,
        processing_metrics: ProcessingMetrics,
    ) -> Self {
        let total_word_count = chapters.iter().map(|c| c.word_count).sum();
        let total_paragraphs = chapters.iter().map(|c| c.paragraphs.len()).sum();
        let total_sentences = chapters.iter().map(Chapter::sentence_count).sum();
        let estimated_total_duration = chapters.iter().map(|c| c.estimated_duration).sum();

        Self {
            metadata,
            total_chapters: chapters.len(),
            chapters,
            total_word_count,
            total_paragraphs,
            total_sentences,
            confidence: confidence_breakdown.overall.clamp(0.0, 1.0),
            confidence_breakdown,
            estimated_total_duration,
            processing_metrics,
        }
    }

    /// Iterate every sentence together with its paragraph.
    pub fn sentences(&self) -> impl Iterator<Item = (&Paragraph, &Sentence)> {
        self.chapters
            .iter()
            .flat_map(|c| c.paragraphs.iter())
            .flat_map(|p| p.sentences.iter().map(move |s| (p, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(words: usize) -> Sentence {
        Sentence {
            id: "ch000_p0000_s000".to_string(),
            text: vec!["word"; words].join(" "),
            word_count: words,
            estimated_duration: words as f64 * 0.4,
            has_formatting: false,
            char_range: CharRange::new(0, words * 5),
            document_position: DocumentPosition {
                chapter_index: 0,
                paragraph_index: 0,
                sentence_index: Some(0),
                start_char: 0,
                end_char: words * 5,
            },
        }
    }

    fn chapter(sentence_words: &[usize]) -> Chapter {
        let sentences: Vec<Sentence> = sentence_words.iter().map(|w| sentence(*w)).collect();
        let word_count = sentence_words.iter().sum();
        Chapter {
            id: "ch000".to_string(),
            title: "One".to_string(),
            level: 2,
            position: 0,
            depth: 0,
            char_range: CharRange::new(0, 100),
            paragraphs: vec![Paragraph {
                id: "ch000_p0000".to_string(),
                content_type: ContentType::Text,
                char_range: CharRange::new(10, 100),
                confidence: 1.0,
                include_in_audio: true,
                sentences,
                word_count,
                estimated_duration: 2.0,
                document_position: DocumentPosition {
                    chapter_index: 0,
                    paragraph_index: 0,
                    sentence_index: None,
                    start_char: 10,
                    end_char: 100,
                },
            }],
            word_count,
            estimated_duration: 2.0,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_char_range_helpers() {
        let outer = CharRange::new(2, 10);
        assert_eq!(outer.len(), 8);
        assert!(outer.contains(&CharRange::new(2, 10)));
        assert!(outer.contains(&CharRange::new(4, 6)));
        assert!(!outer.contains(&CharRange::new(1, 6)));
        assert_eq!(outer.cover(&CharRange::new(8, 12)), CharRange::new(2, 12));
        assert_eq!(CharRange::new(6, 11).slice("Hello world"), "world");
    }

    #[test]
    fn test_assemble_derives_aggregates() {
        let doc = DocumentStructure::assemble(
            DocumentMetadata::default(),
            vec![chapter(&[3, 4]), chapter(&[5])],
            ConfidenceBreakdown::default(),
            ProcessingMetrics {
                started_at: Utc::now(),
                finished_at: Utc::now(),
                duration_ms: 0,
                source_length: 0,
                token_count: 0,
                unassigned_blocks: 0,
                processing_errors: vec![],
            },
        );

        assert_eq!(doc.total_chapters, 2);
        assert_eq!(doc.total_paragraphs, 2);
        assert_eq!(doc.total_sentences, 3);
        assert_eq!(doc.total_word_count, 12);
        assert_eq!(doc.estimated_total_duration, 4.0);
        assert_eq!(doc.sentences().count(), 3);
    }

    #[test]
    fn test_metadata_title_sentinel() {
        let mut metadata = DocumentMetadata::default();
        assert_eq!(metadata.title, UNTITLED_DOCUMENT);
        assert!(!metadata.has_title());

        metadata.title = "  ".to_string();
        assert!(!metadata.has_title());

        metadata.title = "A Tale".to_string();
        assert!(metadata.has_title());
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = serde_json::to_value(chapter(&[2])).unwrap();
        assert!(json.get("charRange").is_some());
        assert!(json.get("estimatedDuration").is_some());
        let paragraph = &json["paragraphs"][0];
        assert_eq!(paragraph["includeInAudio"], true);
        assert_eq!(paragraph["contentType"], "text");
        assert!(paragraph["documentPosition"].get("sentenceIndex").is_none());
    }
}
