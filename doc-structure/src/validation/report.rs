//! Validation finding and report types.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Stable identifier of a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingTitle,
    NoChapters,
    LowOverallConfidence,
    MediumOverallConfidence,
    EmptyChapter,
    ShortChapter,
    LowChapterConfidence,
    EmptyChapterTitle,
    InconsistentChapterLengths,
    ShortSentence,
    LongSentence,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::MissingTitle => "MISSING_TITLE",
            ValidationCode::NoChapters => "NO_CHAPTERS",
            ValidationCode::LowOverallConfidence => "LOW_OVERALL_CONFIDENCE",
            ValidationCode::MediumOverallConfidence => "MEDIUM_OVERALL_CONFIDENCE",
            ValidationCode::EmptyChapter => "EMPTY_CHAPTER",
            ValidationCode::ShortChapter => "SHORT_CHAPTER",
            ValidationCode::LowChapterConfidence => "LOW_CHAPTER_CONFIDENCE",
            ValidationCode::EmptyChapterTitle => "EMPTY_CHAPTER_TITLE",
            ValidationCode::InconsistentChapterLengths => "INCONSISTENT_CHAPTER_LENGTHS",
            ValidationCode::ShortSentence => "SHORT_SENTENCE",
            ValidationCode::LongSentence => "LONG_SENTENCE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ValidationCode::MissingTitle
            | ValidationCode::NoChapters
            | ValidationCode::LowOverallConfidence => Severity::Critical,
            ValidationCode::LowChapterConfidence => Severity::High,
            ValidationCode::MediumOverallConfidence
            | ValidationCode::EmptyChapter
            | ValidationCode::ShortChapter
            | ValidationCode::InconsistentChapterLengths => Severity::Medium,
            ValidationCode::EmptyChapterTitle
            | ValidationCode::ShortSentence
            | ValidationCode::LongSentence => Severity::Low,
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the tree a finding applies. All `None` means the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence: Option<usize>,
}

impl Location {
    pub fn document() -> Self {
        Self::default()
    }

    pub fn chapter(chapter: usize) -> Self {
        Self {
            chapter: Some(chapter),
            ..Self::default()
        }
    }

    pub fn sentence(chapter: usize, paragraph: usize, sentence: usize) -> Self {
        Self {
            chapter: Some(chapter),
            paragraph: Some(paragraph),
            sentence: Some(sentence),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.chapter, self.paragraph, self.sentence) {
            (Some(c), Some(p), Some(s)) => write!(f, "chapter {} paragraph {} sentence {}", c, p, s),
            (Some(c), Some(p), None) => write!(f, "chapter {} paragraph {}", c, p),
            (Some(c), _, _) => write!(f, "chapter {}", c),
            _ => f.write_str("document"),
        }
    }
}

/// A finding that makes the structure invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    pub location: Location,
    pub severity: Severity,
}

impl ValidationError {
    pub fn new(code: ValidationCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            code,
            message: message.into(),
            location,
            severity: code.severity(),
        }
    }
}

/// A finding worth a look that does not invalidate the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    pub code: ValidationCode,
    pub message: String,
    pub location: Location,
    pub severity: Severity,
}

impl ValidationWarning {
    pub fn new(code: ValidationCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            code,
            message: message.into(),
            location,
            severity: code.severity(),
        }
    }
}

/// Output of one validation check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl Findings {
    pub fn error(code: ValidationCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            errors: vec![ValidationError::new(code, message, location)],
            warnings: Vec::new(),
        }
    }

    pub fn warning(code: ValidationCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            errors: Vec::new(),
            warnings: vec![ValidationWarning::new(code, message, location)],
        }
    }

    pub fn merge(mut self, other: Findings) -> Findings {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self
    }
}

impl FromIterator<Findings> for Findings {
    fn from_iter<I: IntoIterator<Item = Findings>>(iter: I) -> Self {
        iter.into_iter().fold(Findings::default(), Findings::merge)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub score: f64,
    pub recommendations: Vec<String>,
    pub needs_manual_review: bool,
}

impl ValidationReport {
    /// Whether any error or warning carries `code`.
    pub fn has_code(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code) || self.warnings.iter().any(|w| w.code == code)
    }

    pub fn critical_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_code() {
        let error = ValidationError::new(
            ValidationCode::MissingTitle,
            "Document has no title",
            Location::document(),
        );
        assert_eq!(error.severity, Severity::Critical);

        let warning = ValidationWarning::new(
            ValidationCode::LowChapterConfidence,
            "Chapter 2 has low confidence",
            Location::chapter(1),
        );
        assert_eq!(warning.severity, Severity::High);
        assert_eq!(
            ValidationCode::EmptyChapterTitle.severity(),
            Severity::Low
        );
    }

    #[test]
    fn test_findings_fold() {
        let all: Findings = vec![
            Findings::error(ValidationCode::NoChapters, "none", Location::document()),
            Findings::default(),
            Findings::warning(ValidationCode::ShortSentence, "short", Location::sentence(0, 1, 2)),
            Findings::warning(ValidationCode::LongSentence, "long", Location::sentence(0, 1, 3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(all.errors.len(), 1);
        assert_eq!(all.warnings.len(), 2);
        assert_eq!(all.warnings[1].location.sentence, Some(3));
    }

    #[test]
    fn test_serialized_codes() {
        let warning = ValidationWarning::new(
            ValidationCode::InconsistentChapterLengths,
            "uneven",
            Location::document(),
        );
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["code"], "INCONSISTENT_CHAPTER_LENGTHS");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["location"], serde_json::json!({}));
        assert_eq!(
            ValidationCode::InconsistentChapterLengths.to_string(),
            "INCONSISTENT_CHAPTER_LENGTHS"
        );
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::document().to_string(), "document");
        assert_eq!(Location::chapter(2).to_string(), "chapter 2");
        assert_eq!(
            Location::sentence(1, 0, 4).to_string(),
            "chapter 1 paragraph 0 sentence 4"
        );
    }
}
