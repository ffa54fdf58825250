//! Document structure extraction for narration pipelines
//!
//! Turns Markdown-flavoured text into a chapter / paragraph / sentence tree:
//! - Block tokenizer with strict and recovering modes
//! - Sentence segmentation with abbreviation handling
//! - Pluggable chapter detection (heading levels, explicit chapter markers)
//! - Confidence scoring with a per-signal breakdown
//! - Structure validation with scored findings and recommendations

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod scoring;
pub mod structure;
pub mod text;
pub mod validation;

pub use config::{EngineConfig, ErrorHandlingStrategy, ParseConfig, ScoringConfig, ValidationConfig};
pub use engine::{ProcessedDocument, StructureEngine, parse_document};
pub use error::{Result, StructureError};
pub use model::{
    CharRange, Chapter, ContentType, CustomMetadata, DocumentMetadata, DocumentPosition,
    DocumentStructure, IssueKind, Paragraph, ProcessingIssue, ProcessingMetrics, Sentence,
    UNTITLED_DOCUMENT,
};
pub use scoring::{ConfidenceBreakdown, ConfidenceScorer};
pub use structure::{ChapterStrategy, HeadingLevelStrategy, PatternStrategy};
pub use validation::{
    Location, Severity, StructureValidator, ValidationCode, ValidationError, ValidationReport,
    ValidationWarning,
};
