//! The parse / score / validate pipeline.

use chrono::Utc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::{Result, StructureError};
use crate::model::{CustomMetadata, DocumentStructure, ProcessingMetrics};
use crate::scoring::ConfidenceScorer;
use crate::structure::{ChapterStrategy, HeadingLevelStrategy, StructureBuilder};
use crate::text::{SentenceSegmenter, tokenize};
use crate::validation::{StructureValidator, ValidationReport};

/// A parsed document together with its validation report.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub structure: DocumentStructure,
    pub report: ValidationReport,
}

/// Holds a validated configuration and everything derived from it.
///
/// The engine keeps no per-call state, so one instance can serve many
/// documents, including from several threads at once.
pub struct StructureEngine {
    config: EngineConfig,
    segmenter: SentenceSegmenter,
    strategy: Box<dyn ChapterStrategy>,
    scorer: ConfidenceScorer,
    validator: StructureValidator,
}

impl StructureEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let segmenter = SentenceSegmenter::from_config(&config.parse)?;
        Ok(Self {
            strategy: Box::new(HeadingLevelStrategy::from_config(&config.parse)),
            scorer: ConfidenceScorer::new(config.scoring.clone()),
            validator: StructureValidator::from_engine_config(&config),
            segmenter,
            config,
        })
    }

    /// Replace the chapter detection strategy.
    pub fn with_strategy(mut self, strategy: impl ChapterStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn parse(&self, text: &str) -> Result<DocumentStructure> {
        self.parse_with_metadata(text, CustomMetadata::new())
    }

    /// Parse `text`, attaching caller-supplied metadata to the result.
    pub fn parse_with_metadata(
        &self,
        text: &str,
        metadata: CustomMetadata,
    ) -> Result<DocumentStructure> {
        self.check_input(text)?;
        let started_at = Utc::now();
        let timer = Instant::now();

        let stream = tokenize(text, self.config.parse.error_handling_strategy)?;
        log::debug!(
            "tokenized {} bytes into {} tokens ({} recovered issue(s))",
            text.len(),
            stream.tokens.len(),
            stream.issues.len()
        );

        let built = StructureBuilder::new(&self.config.parse, &self.segmenter, self.strategy.as_ref())
            .build(text, &stream.tokens, metadata);
        let breakdown = self.scorer.score(&built.chapters, &built.metadata);

        let threshold = self.config.parse.confidence_threshold;
        if breakdown.overall < threshold {
            log::warn!(
                "structure confidence {:.3} is below the threshold {:.3}",
                breakdown.overall,
                threshold
            );
            return Err(StructureError::LowConfidence {
                confidence: breakdown.overall,
                threshold,
            });
        }

        let mut processing_errors = stream.issues;
        processing_errors.extend(built.issues);
        let metrics = ProcessingMetrics {
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.elapsed().as_millis() as u64,
            source_length: text.len(),
            token_count: stream.tokens.len(),
            unassigned_blocks: built.unassigned_blocks,
            processing_errors,
        };

        let doc = DocumentStructure::assemble(built.metadata, built.chapters, breakdown, metrics);
        log::debug!(
            "parsed \"{}\": {} chapter(s), {} paragraph(s), {} sentence(s), confidence {:.3}",
            doc.metadata.title,
            doc.total_chapters,
            doc.total_paragraphs,
            doc.total_sentences,
            doc.confidence
        );
        Ok(doc)
    }

    pub fn validate(&self, doc: &DocumentStructure) -> ValidationReport {
        self.validator.validate(doc)
    }

    /// Parse and validate; critical findings become an error.
    pub fn process(&self, text: &str) -> Result<ProcessedDocument> {
        let structure = self.parse(text)?;
        let report = self.validate(&structure);
        if !report.is_valid {
            return Err(StructureError::ValidationFailure {
                errors: report.errors,
            });
        }
        Ok(ProcessedDocument { structure, report })
    }

    fn check_input(&self, text: &str) -> Result<()> {
        let p = &self.config.parse;
        if text.len() > p.max_input_length {
            return Err(StructureError::InvalidInput(format!(
                "input is {} bytes, the limit is {}",
                text.len(),
                p.max_input_length
            )));
        }
        let significant = text.chars().filter(|c| !c.is_whitespace()).count();
        if significant < p.min_input_length {
            return Err(StructureError::InvalidInput(format!(
                "input has {} non-whitespace character(s), at least {} required",
                significant, p.min_input_length
            )));
        }
        Ok(())
    }
}

/// Parse `text` with a one-off engine built from `config`.
pub fn parse_document(text: &str, config: &EngineConfig) -> Result<DocumentStructure> {
    StructureEngine::new(config.clone())?.parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorHandlingStrategy;
    use crate::model::IssueKind;
    use crate::structure::PatternStrategy;
    use crate::validation::ValidationCode;

    fn engine() -> StructureEngine {
        StructureEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StructureEngine>();
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.parse.sentence_boundary_patterns = vec!["[".to_string()];
        assert!(matches!(
            StructureEngine::new(config),
            Err(StructureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_input_length_limits() {
        let err = engine().parse("x").unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(engine().parse("  \n\t ").is_err());

        let mut config = EngineConfig::default();
        config.parse.max_input_length = 10;
        let small = StructureEngine::new(config).unwrap();
        assert!(matches!(
            small.parse("# Far too long a document"),
            Err(StructureError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_records_metrics() {
        let source = "Intro text before chapters.\n\n## One\n\n```\nunclosed";
        let doc = engine().parse(source).unwrap();
        let metrics = &doc.processing_metrics;
        assert_eq!(metrics.source_length, source.len());
        assert!(metrics.token_count > 0);
        assert_eq!(metrics.unassigned_blocks, 1);
        let kinds: Vec<IssueKind> = metrics.processing_errors.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&IssueKind::UnterminatedCodeFence));
        assert!(kinds.contains(&IssueKind::UnassignedContent));
        assert!(metrics.finished_at >= metrics.started_at);
    }

    #[test]
    fn test_strict_mode_fails_on_malformed_markup() {
        let mut config = EngineConfig::default();
        config.parse.error_handling_strategy = ErrorHandlingStrategy::Strict;
        let err = parse_document("## One\n\n| a | b |\n| c |", &config).unwrap_err();
        assert_eq!(err.code(), "TOKENIZATION_FAILURE");
    }

    #[test]
    fn test_confidence_threshold() {
        let mut config = EngineConfig::default();
        config.parse.confidence_threshold = 0.9;
        let err = parse_document("# Title\n\n## Ch1\n\nHello world.", &config).unwrap_err();
        match err {
            StructureError::LowConfidence {
                confidence,
                threshold,
            } => {
                assert!(confidence < threshold);
                assert_eq!(threshold, 0.9);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_process_fails_on_critical_errors() {
        let err = engine().process("no headings at all").unwrap_err();
        match err {
            StructureError::ValidationFailure { errors } => {
                assert!(errors.iter().any(|e| e.code == ValidationCode::NoChapters));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_with_strategy_swaps_detection() {
        let source = "# Book\n\nChapter 1\n\nIt was a dark and stormy night.\n\nChapter 2\n\nThe storm kept on raging.";
        // Heading levels alone see one chapter holding every marker line
        let doc = engine().parse(source).unwrap();
        assert_eq!(doc.total_chapters, 1);
        assert_eq!(doc.chapters[0].title, "Book");

        let engine = engine().with_strategy(PatternStrategy::new(vec![1, 2]));
        let doc = engine.parse(source).unwrap();
        let titles: Vec<&str> = doc.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1", "Chapter 2"]);
    }
}
