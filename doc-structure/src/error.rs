use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum StructureError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tokenization failed at byte {offset}: {reason}")]
    TokenizationFailure { offset: usize, reason: String },

    #[error("Structure confidence {confidence:.3} is below the configured threshold {threshold:.3}")]
    LowConfidence { confidence: f64, threshold: f64 },

    #[error(
        "Validation failed with {} critical error(s){}",
        errors.len(),
        errors.first().map(|e| format!(": {}", e.message)).unwrap_or_default()
    )]
    ValidationFailure { errors: Vec<ValidationError> },
}

impl StructureError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            StructureError::InvalidInput(_) => "INVALID_INPUT",
            StructureError::InvalidConfig(_) => "INVALID_CONFIG",
            StructureError::TokenizationFailure { .. } => "TOKENIZATION_FAILURE",
            StructureError::LowConfidence { .. } => "LOW_CONFIDENCE",
            StructureError::ValidationFailure { .. } => "VALIDATION_FAILURE",
        }
    }
}

pub type Result<T> = std::result::Result<T, StructureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Location, Severity, ValidationCode};

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StructureError::InvalidInput("empty".into()).code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            StructureError::TokenizationFailure {
                offset: 3,
                reason: "x".into()
            }
            .code(),
            "TOKENIZATION_FAILURE"
        );
        assert_eq!(
            StructureError::LowConfidence {
                confidence: 0.1,
                threshold: 0.5
            }
            .code(),
            "LOW_CONFIDENCE"
        );
    }

    #[test]
    fn test_low_confidence_message() {
        let err = StructureError::LowConfidence {
            confidence: 0.125,
            threshold: 0.5,
        };
        assert_eq!(
            err.to_string(),
            "Structure confidence 0.125 is below the configured threshold 0.500"
        );
    }

    #[test]
    fn test_validation_failure_message_names_first_error() {
        let err = StructureError::ValidationFailure {
            errors: vec![ValidationError::new(
                ValidationCode::NoChapters,
                "Document has no chapters",
                Location::document(),
            )],
        };
        let message = err.to_string();
        assert!(message.contains("1 critical error(s)"));
        assert!(message.contains("Document has no chapters"));
        assert_eq!(err.code(), "VALIDATION_FAILURE");
        if let StructureError::ValidationFailure { errors } = err {
            assert_eq!(errors[0].severity, Severity::Critical);
        }
    }
}
