//! Sign-up and credential checks. Passwords are stored as Argon2id PHC strings.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::application::forms::FieldErrors;
use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::accounts::{validate_password, validate_username};
use crate::domain::entities::UserRecord;

pub const DUPLICATE_USERNAME_MESSAGE: &str = "A user with that username already exists.";
const DECOY_PASSWORD: &str = "yatube-unknown-user";
pub const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("submitted form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    /// Hash checked when the username is unknown, so both failures cost one verification.
    decoy_hash: Arc<OnceCell<String>>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self {
            users,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, AccountError> {
        Ok(self.users.find_user_by_id(id).await?)
    }

    pub async fn signup(&self, input: SignupInput) -> Result<UserRecord, AccountError> {
        let mut errors = FieldErrors::new();
        let username = validate_username(&input.username)
            .map_err(|err| errors.push_domain(err))
            .ok();
        if let Err(err) = validate_password(&input.password, &input.password_confirmation) {
            errors.push_domain(err);
        }
        let username = match username {
            Some(username) if errors.is_empty() => username,
            _ => return Err(AccountError::Invalid(errors)),
        };

        if self.users.find_user_by_username(&username).await?.is_some() {
            return Err(duplicate_username());
        }

        let password_hash = hash_password(input.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => duplicate_username(),
                other => AccountError::Repo(other),
            })?;

        info!(
            target = "yatube::application::accounts",
            user_id = user.id,
            username = %user.username,
            "account created"
        );
        Ok(user)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, AccountError> {
        let Some(user) = self.users.find_user_by_username(username.trim()).await? else {
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| hash_password(DECOY_PASSWORD.to_string()))
                .await?;
            verify_password(password.to_string(), decoy.clone()).await?;
            return Err(AccountError::InvalidCredentials);
        };

        if verify_password(password.to_string(), user.password_hash.clone()).await? {
            Ok(user)
        } else {
            Err(AccountError::InvalidCredentials)
        }
    }
}

fn duplicate_username() -> AccountError {
    let mut errors = FieldErrors::new();
    errors.push("username", DUPLICATE_USERNAME_MESSAGE);
    AccountError::Invalid(errors)
}

/// Hash a password with Argon2id off the async executor.
pub async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AccountError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, stored: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored).map_err(|err| AccountError::Hashing(err.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| AccountError::Hashing(err.to_string()))?
}
