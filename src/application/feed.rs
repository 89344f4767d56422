use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, FollowRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// An author's page: who they are, how much they wrote, and whether the viewer follows them.
#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: UserRecord,
    pub posts_count: u64,
    /// `None` when the viewer is anonymous or is the author.
    pub following: Option<bool>,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author_posts_count: u64,
    pub comments: Vec<CommentRecord>,
}

/// Read side of the site: every paginated listing plus the post detail page.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
            paginator,
        }
    }

    pub async fn index(&self, page: Option<&str>) -> Result<Page<PostRecord>, FeedError> {
        Ok(self.paginate(PostScope::All, page).await?)
    }

    pub async fn group(
        &self,
        slug: &str,
        page: Option<&str>,
    ) -> Result<(GroupRecord, Page<PostRecord>), FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or(FeedError::NotFound("group"))?;
        let posts = self.paginate(PostScope::Group(group.id), page).await?;
        Ok((group, posts))
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<i64>,
        page: Option<&str>,
    ) -> Result<ProfileListing, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(FeedError::NotFound("user"))?;

        let following = match viewer {
            Some(user_id) if user_id != author.id => Some(
                self.follows
                    .is_following(FollowRecord {
                        user_id,
                        author_id: author.id,
                    })
                    .await?,
            ),
            _ => None,
        };

        let page = self.paginate(PostScope::Author(author.id), page).await?;

        Ok(ProfileListing {
            posts_count: page.count,
            author,
            following,
            page,
        })
    }

    /// Posts by the authors `user_id` follows.
    pub async fn follow_feed(
        &self,
        user_id: i64,
        page: Option<&str>,
    ) -> Result<Page<PostRecord>, FeedError> {
        Ok(self.paginate(PostScope::FollowedBy(user_id), page).await?)
    }

    pub async fn post_detail(&self, id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::NotFound("post"))?;
        let author_posts_count = self
            .posts
            .count_posts(PostScope::Author(post.body.author_id))
            .await?;
        let comments = self.comments.list_comments(post.id).await?;

        Ok(PostDetail {
            post,
            author_posts_count,
            comments,
        })
    }

    async fn paginate(
        &self,
        scope: PostScope,
        page: Option<&str>,
    ) -> Result<Page<PostRecord>, RepoError> {
        let count = self.posts.count_posts(scope).await?;
        let window = self.paginator.window(page, count);
        let items = if window.is_empty() {
            Vec::new()
        } else {
            self.posts.list_posts(scope, window).await?
        };
        Ok(window.into_page(items))
    }
}
