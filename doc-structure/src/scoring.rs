//! Confidence model for an extracted structure.
//!
//! The structure score sums bounded rewards for chapter count, titles,
//! balance, sentence distribution, content diversity and metadata. The
//! overall confidence is a weighted average of that score, the share of
//! reasonably sized sentences and the share of titled chapters.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::model::{Chapter, ContentType, DocumentMetadata};

/// Every signal that went into a confidence value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBreakdown {
    pub chapter_count_reward: f64,
    pub title_quality_reward: f64,
    pub balance_reward: f64,
    pub sentence_distribution_reward: f64,
    pub content_diversity_reward: f64,
    pub custom_metadata_reward: f64,
    /// Sum of the rewards above
    pub structure_score: f64,
    /// Coefficient of variation of chapter word counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_length_cv: Option<f64>,
    pub reasonable_sentence_ratio: f64,
    pub title_ratio: f64,
    pub overall: f64,
}

/// Population standard deviation over the mean.
///
/// `None` for fewer than two values or a zero mean.
pub fn coefficient_of_variation(values: &[usize]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values
        .iter()
        .map(|v| {
            let d = *v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(variance.sqrt() / mean)
}

/// Share of chapters with a non-blank title, 0 without chapters.
pub fn title_ratio(chapters: &[Chapter]) -> f64 {
    if chapters.is_empty() {
        return 0.0;
    }
    chapters.iter().filter(|c| c.has_title()).count() as f64 / chapters.len() as f64
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, chapters: &[Chapter], metadata: &DocumentMetadata) -> ConfidenceBreakdown {
        let word_counts: Vec<usize> = chapters.iter().map(|c| c.word_count).collect();
        let cv = coefficient_of_variation(&word_counts);

        let chapter_count_reward = self.chapter_count_reward(chapters.len());
        let title_quality_reward = self.title_quality_reward(chapters);
        let balance_reward = self.balance_reward(cv);
        let sentence_distribution_reward = self.sentence_distribution_reward(chapters);
        let content_diversity_reward = self.content_diversity_reward(chapters);
        let custom_metadata_reward = self.custom_metadata_reward(metadata);

        let structure_score = chapter_count_reward
            + title_quality_reward
            + balance_reward
            + sentence_distribution_reward
            + content_diversity_reward
            + custom_metadata_reward;
        let reasonable_sentence_ratio = self.reasonable_sentence_ratio(chapters);
        let title_ratio = title_ratio(chapters);

        let c = &self.config;
        let weights = c.structure_weight + c.sentence_ratio_weight + c.title_ratio_weight;
        let weighted = structure_score * c.structure_weight
            + reasonable_sentence_ratio * c.sentence_ratio_weight
            + title_ratio * c.title_ratio_weight;
        let overall = if weights > 0.0 {
            (weighted / weights).clamp(0.0, 1.0)
        } else {
            0.0
        };

        log::debug!(
            "confidence {:.3} (structure {:.3}, sentences {:.3}, titles {:.3})",
            overall,
            structure_score,
            reasonable_sentence_ratio,
            title_ratio
        );

        ConfidenceBreakdown {
            chapter_count_reward,
            title_quality_reward,
            balance_reward,
            sentence_distribution_reward,
            content_diversity_reward,
            custom_metadata_reward,
            structure_score,
            chapter_length_cv: cv,
            reasonable_sentence_ratio,
            title_ratio,
            overall,
        }
    }

    pub fn chapter_count_reward(&self, count: usize) -> f64 {
        let c = &self.config;
        if count == 0 {
            return 0.0;
        }
        let mut reward = c.chapter_presence_reward;
        if (c.optimal_chapter_min..=c.optimal_chapter_max).contains(&count) {
            reward += c.optimal_chapter_reward;
        } else if count > 1 {
            reward += c.partial_chapter_reward;
        }
        reward
    }

    pub fn title_quality_reward(&self, chapters: &[Chapter]) -> f64 {
        title_ratio(chapters) * self.config.title_reward_ceiling
    }

    pub fn balance_reward(&self, cv: Option<f64>) -> f64 {
        let c = &self.config;
        match cv {
            Some(cv) if cv < c.balance_low_cv => c.balance_high_reward,
            Some(cv) if cv < c.balance_high_cv => c.balance_medium_reward,
            _ => 0.0,
        }
    }

    /// Rewards an average of a few sentences per paragraph.
    pub fn sentence_distribution_reward(&self, chapters: &[Chapter]) -> f64 {
        let paragraphs: usize = chapters.iter().map(|c| c.paragraphs.len()).sum();
        if paragraphs == 0 {
            return 0.0;
        }
        let sentences: usize = chapters.iter().map(Chapter::sentence_count).sum();
        let average = sentences as f64 / paragraphs as f64;

        let c = &self.config;
        if (c.optimal_sentences_min..=c.optimal_sentences_max).contains(&average) {
            c.sentence_full_reward
        } else if average > 0.0 {
            c.sentence_partial_reward
        } else {
            0.0
        }
    }

    pub fn content_diversity_reward(&self, chapters: &[Chapter]) -> f64 {
        let c = &self.config;
        let reward: f64 = chapters
            .iter()
            .map(|chapter| {
                [
                    (ContentType::Code, c.code_block_reward),
                    (ContentType::List, c.list_reward),
                    (ContentType::Table, c.table_reward),
                ]
                .iter()
                .filter(|(kind, _)| chapter.has_content_type(*kind))
                .map(|(_, r)| r)
                .sum::<f64>()
            })
            .sum();
        reward.min(c.diversity_cap)
    }

    pub fn custom_metadata_reward(&self, metadata: &DocumentMetadata) -> f64 {
        let c = &self.config;
        (metadata.custom_metadata.len() as f64 * c.metadata_per_key_reward).min(c.metadata_cap)
    }

    /// Share of narrated sentences whose length reads naturally.
    pub fn reasonable_sentence_ratio(&self, chapters: &[Chapter]) -> f64 {
        let c = &self.config;
        let (total, reasonable) = chapters
            .iter()
            .flat_map(|ch| ch.paragraphs.iter())
            .filter(|p| p.include_in_audio)
            .flat_map(|p| p.sentences.iter())
            .fold((0usize, 0usize), |(total, ok), s| {
                let fits = (c.reasonable_sentence_min_words..=c.reasonable_sentence_max_words)
                    .contains(&s.word_count);
                (total + 1, ok + usize::from(fits))
            });
        if total == 0 {
            0.0
        } else {
            reasonable as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharRange, DocumentPosition, Paragraph, Sentence};

    fn position() -> DocumentPosition {
        DocumentPosition {
            chapter_index: 0,
            paragraph_index: 0,
            sentence_index: None,
            start_char: 0,
            end_char: 0,
        }
    }

    fn paragraph(content_type: ContentType, sentence_words: &[usize]) -> Paragraph {
        let sentences = sentence_words
            .iter()
            .map(|w| Sentence {
                id: String::new(),
                text: vec!["word"; *w].join(" "),
                word_count: *w,
                estimated_duration: 0.0,
                has_formatting: false,
                char_range: CharRange::default(),
                document_position: position(),
            })
            .collect();
        Paragraph {
            id: String::new(),
            content_type,
            char_range: CharRange::default(),
            confidence: 1.0,
            include_in_audio: true,
            sentences,
            word_count: sentence_words.iter().sum(),
            estimated_duration: 0.0,
            document_position: position(),
        }
    }

    fn chapter(title: &str, paragraphs: Vec<Paragraph>) -> Chapter {
        Chapter {
            id: String::new(),
            title: title.to_string(),
            level: 2,
            position: 0,
            depth: 0,
            char_range: CharRange::default(),
            word_count: paragraphs.iter().map(|p| p.word_count).sum(),
            paragraphs,
            estimated_duration: 0.0,
            confidence: 1.0,
        }
    }

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::default()
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[]), None);
        assert_eq!(coefficient_of_variation(&[10]), None);
        assert_eq!(coefficient_of_variation(&[0, 0]), None);
        assert_eq!(coefficient_of_variation(&[5, 5, 5]), Some(0.0));

        // mean 2, population std 1
        let cv = coefficient_of_variation(&[1, 3]).unwrap();
        assert!((cv - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_chapter_count_tiers() {
        let s = scorer();
        assert_eq!(s.chapter_count_reward(0), 0.0);
        assert!((s.chapter_count_reward(1) - 0.1).abs() < 1e-12);
        assert!((s.chapter_count_reward(2) - 0.2).abs() < 1e-12);
        assert!((s.chapter_count_reward(3) - 0.3).abs() < 1e-12);
        assert!((s.chapter_count_reward(20) - 0.3).abs() < 1e-12);
        assert!((s.chapter_count_reward(21) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_balanced_chapters_get_top_tier() {
        let chapters: Vec<Chapter> = (0..10)
            .map(|i| chapter("Ch", vec![paragraph(ContentType::Text, &[100 + i])]))
            .collect();
        let breakdown = scorer().score(&chapters, &DocumentMetadata::default());
        let cv = breakdown.chapter_length_cv.unwrap();
        assert!(cv < ScoringConfig::default().balance_low_cv);
        assert_eq!(breakdown.balance_reward, ScoringConfig::default().balance_high_reward);
    }

    #[test]
    fn test_balance_tiers() {
        let s = scorer();
        assert_eq!(s.balance_reward(None), 0.0);
        assert_eq!(s.balance_reward(Some(0.2)), 0.2);
        assert_eq!(s.balance_reward(Some(0.7)), 0.1);
        assert_eq!(s.balance_reward(Some(1.5)), 0.0);
    }

    #[test]
    fn test_sentence_distribution() {
        let s = scorer();
        assert_eq!(s.sentence_distribution_reward(&[]), 0.0);

        let three = chapter("A", vec![paragraph(ContentType::Text, &[6, 6, 6])]);
        assert_eq!(s.sentence_distribution_reward(&[three]), 0.15);

        let one = chapter("A", vec![paragraph(ContentType::Text, &[6])]);
        assert_eq!(s.sentence_distribution_reward(&[one]), 0.05);

        let none = chapter("A", vec![paragraph(ContentType::Text, &[])]);
        assert_eq!(s.sentence_distribution_reward(&[none]), 0.0);
    }

    #[test]
    fn test_content_diversity_is_capped() {
        let rich = || {
            chapter(
                "A",
                vec![
                    paragraph(ContentType::Code, &[5]),
                    paragraph(ContentType::List, &[5]),
                    paragraph(ContentType::Table, &[5]),
                ],
            )
        };
        let s = scorer();
        assert!((s.content_diversity_reward(&[rich()]) - 0.06).abs() < 1e-12);
        assert_eq!(s.content_diversity_reward(&[rich(), rich()]), 0.1);
    }

    #[test]
    fn test_custom_metadata_is_capped() {
        let mut metadata = DocumentMetadata::default();
        for i in 0..3 {
            metadata
                .custom_metadata
                .insert(format!("k{}", i), serde_json::Value::Null);
        }
        let s = scorer();
        assert!((s.custom_metadata_reward(&metadata) - 0.03).abs() < 1e-12);
        for i in 3..9 {
            metadata
                .custom_metadata
                .insert(format!("k{}", i), serde_json::Value::Null);
        }
        assert_eq!(s.custom_metadata_reward(&metadata), 0.05);
    }

    #[test]
    fn test_reasonable_ratio_skips_silent_paragraphs() {
        let mut code = paragraph(ContentType::Code, &[1, 1]);
        code.include_in_audio = false;
        let chapters = vec![chapter(
            "A",
            vec![paragraph(ContentType::Text, &[8, 2]), code],
        )];
        assert_eq!(scorer().reasonable_sentence_ratio(&chapters), 0.5);
    }

    #[test]
    fn test_single_short_chapter_overall() {
        let chapters = vec![chapter("Ch1", vec![paragraph(ContentType::Text, &[2])])];
        let breakdown = scorer().score(&chapters, &DocumentMetadata::default());
        // structure 0.1 + 0.2 + 0.05, no reasonable sentences, every chapter titled
        assert!((breakdown.structure_score - 0.35).abs() < 1e-9);
        assert!((breakdown.overall - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_empty_document_scores_zero() {
        let breakdown = scorer().score(&[], &DocumentMetadata::default());
        assert_eq!(breakdown.overall, 0.0);
        assert_eq!(breakdown.chapter_length_cv, None);
    }
}
