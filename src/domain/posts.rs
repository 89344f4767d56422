//! Rules for authored text: validation, previews and the author-only edit guard.

use time::{format_description::FormatItem, macros::format_description};

use super::entities::Authored;
use super::error::DomainError;

/// Characters of a post shown when it is referred to by its text.
pub const PREVIEW_CHARS: usize = 15;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");

pub const ISO_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Normalise submitted text, rejecting blank input.
pub fn validate_text(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text", REQUIRED_MESSAGE));
    }
    Ok(trimmed.to_string())
}

/// Only the original author may change an authored item.
pub fn can_edit<A: Authored>(item: &A, user_id: i64) -> bool {
    item.author_id() == user_id
}

/// Leading characters of a text, cut on a character boundary.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
