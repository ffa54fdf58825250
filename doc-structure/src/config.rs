//! Engine configuration: parsing, scoring and validation knobs.
//!
//! Every field has a serde default so a partial TOML/JSON document (or an
//! empty one) deserializes into a usable configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StructureError};

/// Default boundary pattern: a run of terminal punctuation plus any closing
/// quotes or brackets that trail it.
pub const DEFAULT_BOUNDARY_PATTERN: &str = r#"[.!?;]+["'”’)\]]*"#;

const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "dr", "mr", "mrs", "ms", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "inc", "ltd",
    "co", "no", "vol", "fig", "al", "approx", "cf", "ch", "pp",
];

/// How the tokenizer reacts to malformed markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandlingStrategy {
    /// Degrade malformed blocks to plain text and record a processing issue.
    #[default]
    Recover,
    /// Fail on the first malformed block.
    Strict,
}

/// Top-level configuration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub parse: ParseConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

impl EngineConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.parse;
        if p.max_input_length == 0 {
            return invalid("max_input_length must be positive");
        }
        if p.min_input_length > p.max_input_length {
            return invalid("min_input_length exceeds max_input_length");
        }
        if !(0.0..=1.0).contains(&p.confidence_threshold) {
            return invalid("confidence_threshold must lie in [0, 1]");
        }
        if p.chapter_header_levels.is_empty() {
            return invalid("chapter_header_levels must name at least one heading level");
        }
        if let Some(level) = p.chapter_header_levels.iter().find(|l| !(1..=6).contains(*l)) {
            return invalid(&format!("chapter header level {} is outside 1-6", level));
        }
        if p.min_sentence_length > p.max_sentence_length {
            return invalid("min_sentence_length exceeds max_sentence_length");
        }
        if !(p.words_per_minute.is_finite() && p.words_per_minute > 0.0) {
            return invalid("words_per_minute must be positive");
        }

        let s = &self.scoring;
        if s.balance_low_cv > s.balance_high_cv {
            return invalid("balance_low_cv must not exceed balance_high_cv");
        }
        if s.structure_weight + s.sentence_ratio_weight + s.title_ratio_weight <= 0.0 {
            return invalid("scoring weights must not all be zero");
        }

        let v = &self.validation;
        if v.low_confidence_threshold > v.medium_confidence_threshold {
            return invalid("low_confidence_threshold exceeds medium_confidence_threshold");
        }
        if !(0.0..=1.0).contains(&v.pass_threshold) {
            return invalid("pass_threshold must lie in [0, 1]");
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Result<()> {
    Err(StructureError::InvalidConfig(message.to_string()))
}

/// Options consumed by the tokenizer, segmenter and builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Largest accepted input, in bytes
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Fewest non-whitespace characters an input must carry
    #[serde(default = "default_min_input_length")]
    pub min_input_length: usize,

    /// Parses scoring below this confidence are rejected (0.0 disables)
    #[serde(default)]
    pub confidence_threshold: f64,

    /// Heading levels that open a new chapter
    #[serde(default = "default_chapter_header_levels")]
    pub chapter_header_levels: Vec<u8>,

    /// Audio sentences with fewer words are flagged by the validator
    #[serde(default = "default_min_sentence_length")]
    pub min_sentence_length: usize,

    /// Audio sentences with more words are flagged by the validator
    #[serde(default = "default_max_sentence_length")]
    pub max_sentence_length: usize,

    /// Regexes whose match end marks a candidate sentence boundary
    #[serde(default = "default_boundary_patterns")]
    pub sentence_boundary_patterns: Vec<String>,

    /// Words that never end a sentence when followed by a period
    #[serde(default = "default_abbreviations")]
    pub abbreviations: Vec<String>,

    #[serde(default)]
    pub include_code_blocks: bool,

    #[serde(default)]
    pub include_tables: bool,

    #[serde(default = "default_true")]
    pub include_blockquotes: bool,

    #[serde(default = "default_true")]
    pub include_lists: bool,

    #[serde(default)]
    pub error_handling_strategy: ErrorHandlingStrategy,

    /// Narration speed used for duration estimates
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: f64,

    /// Replace smart quotes, dashes and invisible characters in sentence text
    #[serde(default = "default_true")]
    pub normalize_typography: bool,
}

fn default_max_input_length() -> usize {
    10 * 1024 * 1024
}

fn default_min_input_length() -> usize {
    2
}

fn default_chapter_header_levels() -> Vec<u8> {
    vec![1, 2]
}

fn default_min_sentence_length() -> usize {
    3
}

fn default_max_sentence_length() -> usize {
    50
}

fn default_boundary_patterns() -> Vec<String> {
    vec![DEFAULT_BOUNDARY_PATTERN.to_string()]
}

fn default_abbreviations() -> Vec<String> {
    DEFAULT_ABBREVIATIONS.iter().map(|a| a.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_words_per_minute() -> f64 {
    150.0
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_input_length: default_max_input_length(),
            min_input_length: default_min_input_length(),
            confidence_threshold: 0.0,
            chapter_header_levels: default_chapter_header_levels(),
            min_sentence_length: default_min_sentence_length(),
            max_sentence_length: default_max_sentence_length(),
            sentence_boundary_patterns: default_boundary_patterns(),
            abbreviations: default_abbreviations(),
            include_code_blocks: false,
            include_tables: false,
            include_blockquotes: true,
            include_lists: true,
            error_handling_strategy: ErrorHandlingStrategy::Recover,
            words_per_minute: default_words_per_minute(),
            normalize_typography: true,
        }
    }
}

/// Reward constants for the confidence model.
///
/// The coefficient-of-variation cutoffs for chapter balance are empirical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub chapter_presence_reward: f64,
    pub optimal_chapter_min: usize,
    pub optimal_chapter_max: usize,
    pub optimal_chapter_reward: f64,
    pub partial_chapter_reward: f64,

    pub title_reward_ceiling: f64,

    pub balance_low_cv: f64,
    pub balance_high_cv: f64,
    pub balance_high_reward: f64,
    pub balance_medium_reward: f64,

    pub optimal_sentences_min: f64,
    pub optimal_sentences_max: f64,
    pub sentence_full_reward: f64,
    pub sentence_partial_reward: f64,

    pub code_block_reward: f64,
    pub list_reward: f64,
    pub table_reward: f64,
    pub diversity_cap: f64,

    pub metadata_per_key_reward: f64,
    pub metadata_cap: f64,

    pub reasonable_sentence_min_words: usize,
    pub reasonable_sentence_max_words: usize,

    pub structure_weight: f64,
    pub sentence_ratio_weight: f64,
    pub title_ratio_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            chapter_presence_reward: 0.1,
            optimal_chapter_min: 3,
            optimal_chapter_max: 20,
            optimal_chapter_reward: 0.2,
            partial_chapter_reward: 0.1,
            title_reward_ceiling: 0.2,
            balance_low_cv: 0.5,
            balance_high_cv: 1.0,
            balance_high_reward: 0.2,
            balance_medium_reward: 0.1,
            optimal_sentences_min: 2.0,
            optimal_sentences_max: 5.0,
            sentence_full_reward: 0.15,
            sentence_partial_reward: 0.05,
            code_block_reward: 0.02,
            list_reward: 0.02,
            table_reward: 0.02,
            diversity_cap: 0.1,
            metadata_per_key_reward: 0.01,
            metadata_cap: 0.05,
            reasonable_sentence_min_words: 5,
            reasonable_sentence_max_words: 30,
            structure_weight: 0.5,
            sentence_ratio_weight: 0.3,
            title_ratio_weight: 0.2,
        }
    }
}

/// Thresholds and weights for the structure validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_chapter_words: usize,
    pub min_chapter_confidence: f64,
    /// Chapters longer than `mean * above` are outliers
    pub length_deviation_above: f64,
    /// Chapters shorter than `mean * below` are outliers
    pub length_deviation_below: f64,
    pub low_confidence_threshold: f64,
    pub medium_confidence_threshold: f64,
    pub error_weight: f64,
    pub warning_weight: f64,
    /// Lower clamp for the report score
    pub pass_threshold: f64,
    pub manual_review_score: f64,
    pub manual_review_max_warnings: usize,
    pub recommend_review_warnings: usize,
    pub split_chapter_words: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chapter_words: 100,
            min_chapter_confidence: 0.7,
            length_deviation_above: 3.0,
            length_deviation_below: 0.2,
            low_confidence_threshold: 0.3,
            medium_confidence_threshold: 0.6,
            error_weight: 0.25,
            warning_weight: 0.05,
            pass_threshold: 0.0,
            manual_review_score: 0.7,
            manual_review_max_warnings: 10,
            recommend_review_warnings: 5,
            split_chapter_words: 5000,
        }
    }
}
