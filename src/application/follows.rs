use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::{FollowRecord, UserRecord};
use crate::domain::follows::{FollowDecision, decide_follow};

const TARGET: &str = "yatube::application::follows";

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author not found")]
    UnknownAuthor,
    #[error("follow edge not found")]
    NotFollowing,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What a follow request did. Every variant leads to the same redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Idempotent follow; following yourself is ignored.
    pub async fn follow(
        &self,
        user_id: i64,
        author_username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.find_author(author_username).await?;

        let outcome = match decide_follow(user_id, author.id) {
            FollowDecision::SelfFollow => FollowOutcome::SelfFollow,
            FollowDecision::Create => {
                let created = self
                    .follows
                    .create_follow(FollowRecord {
                        user_id,
                        author_id: author.id,
                    })
                    .await?;
                if created {
                    FollowOutcome::Created
                } else {
                    FollowOutcome::AlreadyFollowing
                }
            }
        };

        match outcome {
            FollowOutcome::Created => {
                counter!("yatube_follows_created_total").increment(1);
                info!(target = TARGET, user_id, author_id = author.id, "follow created");
            }
            other => {
                debug!(target = TARGET, user_id, author_id = author.id, outcome = ?other, "follow request absorbed");
            }
        }

        Ok((author, outcome))
    }

    /// Remove an existing edge; a missing edge is reported as not found.
    pub async fn unfollow(
        &self,
        user_id: i64,
        author_username: &str,
    ) -> Result<UserRecord, FollowError> {
        let author = self.find_author(author_username).await?;

        self.follows
            .delete_follow(FollowRecord {
                user_id,
                author_id: author.id,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => FollowError::NotFollowing,
                other => FollowError::Repo(other),
            })?;

        info!(target = TARGET, user_id, author_id = author.id, "follow removed");
        Ok(author)
    }

    async fn find_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}
