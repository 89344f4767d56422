use time::OffsetDateTime;

use crate::domain::entities::{AuthoredText, GroupRef, PostRecord};

/// Column list matching [`PostRow`]; callers alias posts as `p`, users as `u`, groups as `g`.
pub(super) const POST_COLUMNS: &str = "p.id, p.text, p.pub_date, p.author_id, \
    u.username AS author_username, p.image, \
    g.id AS group_id, g.title AS group_title, g.slug AS group_slug";

#[derive(sqlx::FromRow)]
pub(super) struct PostRow {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub author_username: String,
    pub image: Option<String>,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupRef { id, title, slug }),
            _ => None,
        };

        Self {
            id: row.id,
            body: AuthoredText {
                author_id: row.author_id,
                author_username: row.author_username,
                text: row.text,
                pub_date: row.pub_date,
            },
            group,
            image: row.image,
        }
    }
}
