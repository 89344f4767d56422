use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::application::forms::FieldErrors;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::posts;

pub const INVALID_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("only the author may edit this post")]
    NotAuthor,
    #[error("submitted form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw values of the post form as submitted.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    /// Group id as typed into the select; empty means "no group".
    pub group: String,
}

/// A post form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
}

/// Write side for posts and comments, with the author-only edit guard.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            writes,
            groups,
            comments,
        }
    }

    /// Groups offered in the post form's select.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Check text and group choice, collecting every field error.
    pub async fn validate(&self, input: &PostInput) -> Result<ValidPost, PostError> {
        let mut errors = FieldErrors::new();

        let text = match posts::validate_text(&input.text) {
            Ok(text) => Some(text),
            Err(err) => {
                errors.push_domain(err);
                None
            }
        };

        let group_id = match input.group.trim() {
            "" => None,
            raw => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => self.groups.find_group(id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if found.is_none() {
                    errors.push("group", INVALID_GROUP_MESSAGE);
                }
                found
            }
        };

        match text {
            Some(text) if errors.is_empty() => Ok(ValidPost { text, group_id }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    pub async fn create(
        &self,
        author_id: i64,
        post: ValidPost,
        image: Option<String>,
    ) -> Result<PostRecord, PostError> {
        let record = self
            .writes
            .create_post(CreatePostParams {
                author_id,
                text: post.text,
                group_id: post.group_id,
                image,
            })
            .await?;

        counter!("yatube_posts_created_total").increment(1);
        info!(
            target = "yatube::application::posts",
            post_id = record.id,
            author_id,
            group_id = ?record.group.as_ref().map(|group| group.id),
            "post created"
        );
        Ok(record)
    }

    /// Load a post for editing, applying the author-only guard.
    pub async fn load_for_edit(&self, post_id: i64, user_id: i64) -> Result<PostRecord, PostError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        if !posts::can_edit(&post, user_id) {
            return Err(PostError::NotAuthor);
        }
        Ok(post)
    }

    pub async fn update(
        &self,
        post_id: i64,
        user_id: i64,
        post: ValidPost,
        image: Option<String>,
    ) -> Result<PostRecord, PostError> {
        self.load_for_edit(post_id, user_id).await?;

        let record = self
            .writes
            .update_post(UpdatePostParams {
                id: post_id,
                text: post.text,
                group_id: post.group_id,
                image,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => PostError::NotFound,
                other => PostError::Repo(other),
            })?;

        info!(
            target = "yatube::application::posts",
            post_id,
            user_id,
            "post updated"
        );
        Ok(record)
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(PostError::NotFound);
        }

        let text = posts::validate_text(text).map_err(|err| {
            let mut errors = FieldErrors::new();
            errors.push_domain(err);
            PostError::Invalid(errors)
        })?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id,
                text,
            })
            .await?;

        counter!("yatube_comments_created_total").increment(1);
        info!(
            target = "yatube::application::posts",
            post_id,
            comment_id = comment.id,
            author_id,
            "comment added"
        );
        Ok(comment)
    }
}
