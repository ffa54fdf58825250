//! Structure validation.
//!
//! Each check inspects the finished tree and returns its own [`Findings`];
//! the validator folds them into one [`ValidationReport`].

pub mod report;

pub use report::{
    Findings, Location, Severity, ValidationCode, ValidationError, ValidationReport,
    ValidationWarning,
};

use crate::config::{EngineConfig, ValidationConfig};
use crate::model::DocumentStructure;

type Check = fn(&StructureValidator, &DocumentStructure) -> Findings;

#[derive(Debug, Clone)]
pub struct StructureValidator {
    config: ValidationConfig,
    min_sentence_words: usize,
    max_sentence_words: usize,
}

impl StructureValidator {
    pub fn new(config: ValidationConfig, min_sentence_words: usize, max_sentence_words: usize) -> Self {
        Self {
            config,
            min_sentence_words,
            max_sentence_words,
        }
    }

    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self::new(
            config.validation.clone(),
            config.parse.min_sentence_length,
            config.parse.max_sentence_length,
        )
    }

    pub fn validate(&self, doc: &DocumentStructure) -> ValidationReport {
        const CHECKS: [Check; 5] = [
            StructureValidator::check_document,
            StructureValidator::check_chapters,
            StructureValidator::check_chapter_balance,
            StructureValidator::check_sentences,
            StructureValidator::check_confidence,
        ];
        let findings: Findings = CHECKS.iter().map(|check| check(self, doc)).collect();

        let c = &self.config;
        let penalty = findings.errors.len() as f64 * c.error_weight
            + findings.warnings.len() as f64 * c.warning_weight;
        let score = (1.0 - penalty).clamp(c.pass_threshold, 1.0);
        let needs_manual_review =
            score < c.manual_review_score || findings.warnings.len() > c.manual_review_max_warnings;
        let recommendations = self.recommendations(doc, &findings);

        log::debug!(
            "validation: {} error(s), {} warning(s), score {:.2}",
            findings.errors.len(),
            findings.warnings.len(),
            score
        );

        ValidationReport {
            is_valid: findings.errors.is_empty(),
            errors: findings.errors,
            warnings: findings.warnings,
            score,
            recommendations,
            needs_manual_review,
        }
    }

    fn check_document(&self, doc: &DocumentStructure) -> Findings {
        let mut findings = Findings::default();
        if !doc.metadata.has_title() {
            findings = findings.merge(Findings::error(
                ValidationCode::MissingTitle,
                "Document has no title",
                Location::document(),
            ));
        }
        if doc.chapters.is_empty() {
            findings = findings.merge(Findings::error(
                ValidationCode::NoChapters,
                "Document has no chapters",
                Location::document(),
            ));
        }
        findings
    }

    fn check_chapters(&self, doc: &DocumentStructure) -> Findings {
        let c = &self.config;
        doc.chapters
            .iter()
            .enumerate()
            .flat_map(|(index, chapter)| {
                let location = Location::chapter(index);
                let mut found = Vec::new();
                if !chapter.has_title() {
                    found.push(Findings::warning(
                        ValidationCode::EmptyChapterTitle,
                        format!("Chapter {} has an empty title", index + 1),
                        location,
                    ));
                }
                if chapter.paragraphs.is_empty() {
                    found.push(Findings::warning(
                        ValidationCode::EmptyChapter,
                        format!("Chapter {} has no content", index + 1),
                        location,
                    ));
                    return found;
                }
                if chapter.word_count < c.min_chapter_words {
                    found.push(Findings::warning(
                        ValidationCode::ShortChapter,
                        format!(
                            "Chapter {} has only {} words (minimum {})",
                            index + 1,
                            chapter.word_count,
                            c.min_chapter_words
                        ),
                        location,
                    ));
                }
                if chapter.confidence < c.min_chapter_confidence {
                    found.push(Findings::warning(
                        ValidationCode::LowChapterConfidence,
                        format!(
                            "Chapter {} has low confidence {:.2}",
                            index + 1,
                            chapter.confidence
                        ),
                        location,
                    ));
                }
                found
            })
            .collect()
    }

    fn check_chapter_balance(&self, doc: &DocumentStructure) -> Findings {
        let c = &self.config;
        if doc.chapters.len() < 2 {
            return Findings::default();
        }
        let mean = doc.chapters.iter().map(|ch| ch.word_count).sum::<usize>() as f64
            / doc.chapters.len() as f64;
        if mean <= 0.0 {
            return Findings::default();
        }

        let outliers = doc
            .chapters
            .iter()
            .filter(|ch| {
                let words = ch.word_count as f64;
                words > mean * c.length_deviation_above || words < mean * c.length_deviation_below
            })
            .count();
        if outliers == 0 {
            return Findings::default();
        }
        Findings::warning(
            ValidationCode::InconsistentChapterLengths,
            format!(
                "{} chapter(s) deviate strongly from the average length of {:.0} words",
                outliers, mean
            ),
            Location::document(),
        )
    }

    /// Length checks on sentences that will be narrated.
    fn check_sentences(&self, doc: &DocumentStructure) -> Findings {
        let mut findings = Findings::default();
        for (c, chapter) in doc.chapters.iter().enumerate() {
            for (p, paragraph) in chapter.paragraphs.iter().enumerate() {
                if !paragraph.include_in_audio {
                    continue;
                }
                for (s, sentence) in paragraph.sentences.iter().enumerate() {
                    let location = Location::sentence(c, p, s);
                    if sentence.word_count < self.min_sentence_words {
                        findings.warnings.push(ValidationWarning::new(
                            ValidationCode::ShortSentence,
                            format!(
                                "Sentence has only {} word(s): {:?}",
                                sentence.word_count, sentence.text
                            ),
                            location,
                        ));
                    } else if sentence.word_count > self.max_sentence_words {
                        findings.warnings.push(ValidationWarning::new(
                            ValidationCode::LongSentence,
                            format!("Sentence has {} words", sentence.word_count),
                            location,
                        ));
                    }
                }
            }
        }
        findings
    }

    fn check_confidence(&self, doc: &DocumentStructure) -> Findings {
        let c = &self.config;
        if doc.confidence < c.low_confidence_threshold {
            Findings::error(
                ValidationCode::LowOverallConfidence,
                format!("Structure confidence {:.2} is too low", doc.confidence),
                Location::document(),
            )
        } else if doc.confidence < c.medium_confidence_threshold {
            Findings::warning(
                ValidationCode::MediumOverallConfidence,
                format!("Structure confidence {:.2} is moderate", doc.confidence),
                Location::document(),
            )
        } else {
            Findings::default()
        }
    }

    fn recommendations(&self, doc: &DocumentStructure, findings: &Findings) -> Vec<String> {
        let c = &self.config;
        let mut recommendations = Vec::new();
        if !findings.errors.is_empty() {
            recommendations.push("Fix structural errors before processing".to_string());
        }
        if findings.warnings.len() > c.recommend_review_warnings {
            recommendations.push("Review the document structure for quality issues".to_string());
        }
        if doc.chapters.len() == 1 && doc.chapters[0].word_count > c.split_chapter_words {
            recommendations.push("Consider splitting the single long chapter".to_string());
        }
        if doc.confidence < c.medium_confidence_threshold {
            recommendations.push("Add explicit chapter headings to improve detection".to_string());
        }
        recommendations
    }
}
