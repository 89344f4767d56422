//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Group fields carried alongside a post when it is listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

/// The field set shared by posts and comments: who wrote what, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthoredText {
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
}

/// Anything carrying an [`AuthoredText`].
pub trait Authored {
    fn authored(&self) -> &AuthoredText;

    fn author_id(&self) -> i64 {
        self.authored().author_id
    }

    fn text(&self) -> &str {
        &self.authored().text
    }

    fn pub_date(&self) -> OffsetDateTime {
        self.authored().pub_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    #[serde(flatten)]
    pub body: AuthoredText,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

impl Authored for PostRecord {
    fn authored(&self) -> &AuthoredText {
        &self.body
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    #[serde(flatten)]
    pub body: AuthoredText,
}

impl Authored for CommentRecord {
    fn authored(&self) -> &AuthoredText {
        &self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowRecord {
    pub user_id: i64,
    pub author_id: i64,
}
