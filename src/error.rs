#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttainmentError {
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("No questions mapped to outcome {outcome}")]
    MissingData { outcome: String },
}

impl AttainmentError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(outcome: impl Into<String>) -> Self {
        Self::MissingData {
            outcome: outcome.into(),
        }
    }

    /// The offending field, for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::MissingData { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AttainmentError>;
