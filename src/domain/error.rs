use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("`{field}` is invalid: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Field and message of a validation failure.
    pub fn as_field_error(&self) -> (&'static str, &str) {
        match self {
            DomainError::Validation { field, message } => (field, message.as_str()),
        }
    }
}
