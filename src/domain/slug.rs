//! Group slug derivation and validation.

use slug::slugify;
use thiserror::Error;

pub const SLUG_MAX_CHARS: usize = 100;

/// Errors that can occur while deriving or checking a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug may contain only letters, numbers, underscores or hyphens")]
    InvalidCharacters,
    #[error("slug exceeds {SLUG_MAX_CHARS} characters")]
    TooLong,
}

/// Derive a slug from a human-readable title, transliterating to ASCII.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }
    if candidate.len() > SLUG_MAX_CHARS {
        candidate.truncate(SLUG_MAX_CHARS);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }

    Ok(candidate)
}

/// Accept an explicit slug as typed by an administrator.
pub fn validate_slug(input: &str) -> Result<String, SlugError> {
    let slug = input.trim();
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.len() > SLUG_MAX_CHARS {
        return Err(SlugError::TooLong);
    }
    if !slug
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(SlugError::InvalidCharacters);
    }
    Ok(slug.to_string())
}
