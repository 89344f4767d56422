//! Account credential rules.

use super::error::DomainError;

pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Usernames are letters, digits and `@`, `.`, `+`, `-`, `_`.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation(
            "username",
            super::posts::REQUIRED_MESSAGE,
        ));
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_CHARS} characters."),
        ));
    }
    let allowed = |ch: char| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_');
    if !username.chars().all(allowed) {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), DomainError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(DomainError::validation(
            "password",
            format!("This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."),
        ));
    }
    if password != confirmation {
        return Err(DomainError::validation(
            "password_confirmation",
            "The two password fields didn't match.",
        ));
    }
    Ok(())
}
