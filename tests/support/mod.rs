#![allow(dead_code)]

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use yatube::application::accounts::AccountService;
use yatube::application::feed::FeedService;
use yatube::application::follows::FollowService;
use yatube::application::groups::GroupAdminService;
use yatube::application::pagination::{PageWindow, Paginator};
use yatube::application::posts::PostService;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, GroupsWriteRepo, HealthRepo, PostScope, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams, UsersRepo,
};
use yatube::domain::entities::{
    AuthoredText, CommentRecord, FollowRecord, GroupRecord, GroupRef, PostRecord, UserRecord,
};
use yatube::infra::cache::PageCache;
use yatube::infra::http::{AdminState, HttpState, SESSION_COOKIE, build_admin_router, build_router};
use yatube::infra::uploads::UploadStorage;

pub const PAGE_SIZE: u32 = 10;
pub const INDEX_TTL: Duration = Duration::from_secs(20);
pub const PAGE_CACHE_ENTRIES: usize = 8;
pub const BOUNDARY: &str = "yatube-test-boundary";

struct StoredPost {
    id: i64,
    author_id: i64,
    text: String,
    pub_date: OffsetDateTime,
    group_id: Option<i64>,
    image: Option<String>,
}

struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    pub_date: OffsetDateTime,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    ticks: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: Vec<FollowRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so newest-first ordering is deterministic.
    fn now(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        datetime!(2024-01-01 0:00 UTC) + time::Duration::seconds(self.ticks)
    }

    fn username(&self, id: i64) -> String {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.username.clone())
            .unwrap_or_default()
    }

    fn in_scope(&self, post: &StoredPost, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(group_id) => post.group_id == Some(group_id),
            PostScope::Author(author_id) => post.author_id == author_id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }

    fn record(&self, post: &StoredPost) -> PostRecord {
        PostRecord {
            id: post.id,
            body: AuthoredText {
                author_id: post.author_id,
                author_username: self.username(post.author_id),
                text: post.text.clone(),
                pub_date: post.pub_date,
            },
            group: post.group_id.and_then(|id| {
                self.groups.iter().find(|g| g.id == id).map(|g| GroupRef {
                    id: g.id,
                    title: g.title.clone(),
                    slug: g.slug.clone(),
                })
            }),
            image: post.image.clone(),
        }
    }

    fn newest_first(&self, scope: PostScope) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| self.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// In-memory stand-in for every repository trait.
#[derive(Default)]
pub struct MemoryRepos {
    state: Mutex<MemoryState>,
}

impl MemoryRepos {
    pub async fn seed_user(&self, username: &str) -> UserRecord {
        let mut state = self.state.lock().await;
        let user = UserRecord {
            id: state.next_id(),
            username: username.to_string(),
            password_hash: "!unusable".to_string(),
            created_at: state.now(),
        };
        state.users.push(user.clone());
        user
    }

    pub async fn seed_group(&self, title: &str, slug: &str) -> GroupRecord {
        self.create_group(CreateGroupParams {
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        })
        .await
        .expect("seed group")
    }

    pub async fn seed_post(&self, author: &UserRecord, text: &str, group_id: Option<i64>) -> PostRecord {
        self.create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id,
            image: None,
        })
        .await
        .expect("seed post")
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    pub async fn follow_edges(&self) -> Vec<FollowRecord> {
        self.state.lock().await.follows.clone()
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.find_post(id).await.expect("find post")
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: state.next_id(),
            username: params.username,
            password_hash: params.password_hash,
            created_at: state.now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        Ok(self.state.lock().await.groups.clone())
    }

    async fn find_group(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|g| g.slug == slug).cloned())
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryRepos {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.groups.iter().any(|g| g.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: state.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, slug: &str) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let Some(index) = state.groups.iter().position(|g| g.slug == slug) else {
            return Err(RepoError::NotFound);
        };
        let group = state.groups.remove(index);
        for post in state.posts.iter_mut() {
            if post.group_id == Some(group.id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.newest_first(scope).len() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .newest_first(scope)
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
            .map(|post| state.record(post))
            .collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.record(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = StoredPost {
            id: state.next_id(),
            author_id: params.author_id,
            text: params.text,
            pub_date: state.now(),
            group_id: params.group_id,
            image: params.image,
        };
        let record = state.record(&post);
        state.posts.push(post);
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let Some(index) = state.posts.iter().position(|p| p.id == params.id) else {
            return Err(RepoError::NotFound);
        };
        let post = &mut state.posts[index];
        post.text = params.text;
        post.group_id = params.group_id;
        if params.image.is_some() {
            post.image = params.image;
        }
        Ok(state.record(&state.posts[index]))
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.posts.len();
        state.posts.retain(|post| post.id != id);
        if state.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        state.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut comments: Vec<CommentRecord> = state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| CommentRecord {
                id: c.id,
                post_id: c.post_id,
                body: AuthoredText {
                    author_id: c.author_id,
                    author_username: state.username(c.author_id),
                    text: c.text.clone(),
                    pub_date: c.pub_date,
                },
            })
            .collect();
        comments.sort_by(|a, b| b.body.pub_date.cmp(&a.body.pub_date));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let comment = StoredComment {
            id: state.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            pub_date: state.now(),
        };
        let record = CommentRecord {
            id: comment.id,
            post_id: comment.post_id,
            body: AuthoredText {
                author_id: comment.author_id,
                author_username: state.username(comment.author_id),
                text: comment.text.clone(),
                pub_date: comment.pub_date,
            },
        };
        state.comments.push(comment);
        Ok(record)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepos {
    async fn is_following(&self, edge: FollowRecord) -> Result<bool, RepoError> {
        Ok(self.state.lock().await.follows.contains(&edge))
    }

    async fn create_follow(&self, edge: FollowRecord) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if edge.user_id == edge.author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        if state.follows.contains(&edge) {
            return Ok(false);
        }
        state.follows.push(edge);
        Ok(true)
    }

    async fn delete_follow(&self, edge: FollowRecord) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.follows.len();
        state.follows.retain(|existing| *existing != edge);
        if state.follows.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryRepos {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct TestApp {
    pub repos: Arc<MemoryRepos>,
    pub router: Router,
    pub admin: Router,
    pub page_cache: PageCache,
    pub key: Key,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let repos = Arc::new(MemoryRepos::default());
        let media = tempfile::tempdir().expect("media dir");
        let page_cache = PageCache::new(
            INDEX_TTL,
            NonZeroUsize::new(PAGE_CACHE_ENTRIES).expect("non-zero"),
        );
        let key = Key::generate();

        let paginator = Paginator::new(NonZeroU32::new(PAGE_SIZE).expect("non-zero"));
        let feed = FeedService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            paginator,
        );
        let posts = PostService::new(repos.clone(), repos.clone(), repos.clone(), repos.clone());
        let follows = FollowService::new(repos.clone(), repos.clone());
        let accounts = AccountService::new(repos.clone());
        let groups = GroupAdminService::new(repos.clone(), repos.clone());

        let http_state = HttpState {
            feed: Arc::new(feed),
            posts: Arc::new(posts),
            follows: Arc::new(follows),
            accounts: Arc::new(accounts),
            upload_storage: Arc::new(
                UploadStorage::new(media.path().to_path_buf()).expect("upload storage"),
            ),
            upload_limit_bytes: 10 * 1024 * 1024,
            page_cache: page_cache.clone(),
            session_key: key.clone(),
        };
        let admin_state = AdminState {
            groups: Arc::new(groups),
            posts: repos.clone(),
            page_cache: page_cache.clone(),
            health: repos.clone(),
        };

        Self {
            router: build_router(http_state),
            admin: build_admin_router(admin_state),
            repos,
            page_cache,
            key,
            media,
        }
    }

    /// `Cookie` header value carrying a signed session for `user`.
    pub fn session_cookie(&self, user: &UserRecord) -> String {
        let jar = SignedCookieJar::new(self.key.clone())
            .add(Cookie::new(SESSION_COOKIE, user.id.to_string()));
        let response = (jar, ()).into_response();
        let header = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("set-cookie header");
        header
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, user: Option<&UserRecord>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(user) = user {
            builder = builder.header(COOKIE, self.session_cookie(user));
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        user: Option<&UserRecord>,
        fields: &[(&str, &str)],
    ) -> Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(user) = user {
            builder = builder.header(COOKIE, self.session_cookie(user));
        }
        self.send(builder.body(Body::from(body)).expect("request")).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        user: Option<&UserRecord>,
        body: Vec<u8>,
    ) -> Response {
        let mut builder = Request::post(uri).header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(user) = user {
            builder = builder.header(COOKIE, self.session_cookie(user));
        }
        self.send(builder.body(Body::from(body)).expect("request")).await
    }

    pub async fn admin_request(&self, request: Request<Body>) -> Response {
        self.admin
            .clone()
            .oneshot(request)
            .await
            .expect("admin router is infallible")
    }
}

/// Multipart body for the post form.
pub fn post_form_body(text: &str, group: &str, image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("text", text), ("group", group)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::FOUND, "expected a redirect");
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Number of rendered post cards on a listing page.
pub fn card_count(html: &str) -> usize {
    html.matches("<article class=\"post\"").count()
}

pub const GIF_1X1: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];
