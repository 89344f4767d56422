use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::FieldErrors;
use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::{HUMAN_DATE_FORMAT, ISO_DATE_FORMAT, preview};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;

const SITE_TITLE: &str = "Yatube";
const SITE_DESCRIPTION: &str = "Posts, groups and the authors you follow.";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title("Page not found"), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

impl NavigationLinkView {
    fn new(label: &str, href: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            href: href.into(),
        }
    }
}

/// The signed-in user as shown in the header.
#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub profile_href: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<ViewerView>,
}

impl LayoutChrome {
    /// Chrome without any session details; the only variant the page cache may store.
    pub fn anonymous() -> Self {
        Self::for_viewer(None)
    }

    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        let mut entries = vec![NavigationLinkView::new("Home", "/")];
        let viewer = match viewer {
            Some(user) => {
                entries.push(NavigationLinkView::new("New post", "/create/"));
                entries.push(NavigationLinkView::new("Following", "/follow/"));
                entries.push(NavigationLinkView::new("Log out", "/auth/logout/"));
                Some(ViewerView {
                    username: user.username.clone(),
                    profile_href: profile_href(&user.username),
                })
            }
            None => {
                entries.push(NavigationLinkView::new("Log in", "/auth/login/"));
                entries.push(NavigationLinkView::new("Sign up", "/auth/signup/"));
                None
            }
        };

        let year = OffsetDateTime::now_utc().year();
        Self {
            brand: BrandView {
                title: SITE_TITLE.to_string(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            footer: FooterView {
                copy: format!("© {year} {SITE_TITLE}"),
            },
            meta: PageMetaView {
                title: SITE_TITLE.to_string(),
                description: SITE_DESCRIPTION.to_string(),
            },
            viewer,
        }
    }

    pub fn with_title(self, title: impl AsRef<str>) -> Self {
        Self {
            meta: self.meta.with_title(title.as_ref()),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            viewer: chrome.viewer,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

impl PageMetaView {
    pub fn with_title(self, title: &str) -> Self {
        Self {
            title: format!("{title} | {SITE_TITLE}"),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct GroupLinkView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub author_href: String,
    pub published: String,
    pub published_iso: String,
    pub group: Option<GroupLinkView>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

impl PostCardView {
    pub fn from_record(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.body.text.clone(),
            author_username: post.body.author_username.clone(),
            author_href: profile_href(&post.body.author_username),
            published: format_human_date(post.body.pub_date),
            published_iso: format_iso_date(post.body.pub_date),
            group: post.group.as_ref().map(|group| GroupLinkView {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            detail_href: post_href(post.id),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u64,
    pub href: String,
    pub current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub first_href: Option<String>,
    pub last_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    const NEIGHBOURS: u64 = 2;

    pub fn from_page<T>(page: &Page<T>) -> Self {
        let lower = page.number.saturating_sub(Self::NEIGHBOURS).max(1);
        let upper = (page.number + Self::NEIGHBOURS).min(page.num_pages);
        let pages = (lower..=upper)
            .map(|number| PageLinkView {
                number,
                href: page_href(number),
                current: number == page.number,
            })
            .collect();

        Self {
            number: page.number,
            num_pages: page.num_pages,
            previous_href: page.previous_page_number().map(page_href),
            next_href: page.next_page_number().map(page_href),
            first_href: page.has_previous().then(|| page_href(1)),
            last_href: page.has_next().then(|| page_href(page.num_pages)),
            pages,
        }
    }

    pub fn is_needed(&self) -> bool {
        self.num_pages > 1
    }
}

/// A page of post cards with its paginator.
#[derive(Clone)]
pub struct PostListView {
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

impl PostListView {
    pub fn from_page(page: &Page<PostRecord>) -> Self {
        Self {
            posts: page.items.iter().map(PostCardView::from_record).collect(),
            paginator: PaginatorView::from_page(page),
        }
    }
}

pub struct IndexContent {
    pub listing: PostListView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContent>,
}

pub struct GroupContent {
    pub title: String,
    pub description: String,
    pub listing: PostListView,
}

impl GroupContent {
    pub fn new(group: &GroupRecord, page: &Page<PostRecord>) -> Self {
        Self {
            title: group.title.clone(),
            description: group.description.clone(),
            listing: PostListView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContent>,
}

/// Follow control shown on another author's profile.
pub struct FollowControlView {
    pub following: bool,
    pub action_href: String,
}

pub struct ProfileContent {
    pub username: String,
    pub posts_count: u64,
    pub follow: Option<FollowControlView>,
    pub listing: PostListView,
}

impl ProfileContent {
    pub fn new(
        author: &UserRecord,
        posts_count: u64,
        following: Option<bool>,
        page: &Page<PostRecord>,
    ) -> Self {
        let base = profile_href(&author.username);
        Self {
            username: author.username.clone(),
            posts_count,
            follow: following.map(|following| FollowControlView {
                following,
                action_href: if following {
                    format!("{base}unfollow/")
                } else {
                    format!("{base}follow/")
                },
            }),
            listing: PostListView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContent>,
}

pub struct CommentView {
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
    pub published_iso: String,
}

impl CommentView {
    pub fn from_record(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.body.author_username.clone(),
            author_href: profile_href(&comment.body.author_username),
            text: comment.body.text.clone(),
            published: format_human_date(comment.body.pub_date),
            published_iso: format_iso_date(comment.body.pub_date),
        }
    }
}

pub struct PostDetailContent {
    pub post: PostCardView,
    pub title: String,
    pub author_posts_count: u64,
    pub edit_href: Option<String>,
    pub comment_action: Option<String>,
    pub comments: Vec<CommentView>,
}

impl PostDetailContent {
    pub fn new(
        post: &PostRecord,
        author_posts_count: u64,
        comments: &[CommentRecord],
        viewer: Option<&UserRecord>,
    ) -> Self {
        let is_author = viewer.is_some_and(|user| user.id == post.body.author_id);
        Self {
            post: PostCardView::from_record(post),
            title: preview(&post.body.text),
            author_posts_count,
            edit_href: is_author.then(|| format!("/posts/{}/edit/", post.id)),
            comment_action: viewer.map(|_| format!("/posts/{}/comment/", post.id)),
            comments: comments.iter().map(CommentView::from_record).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContent>,
}

pub struct FollowContent {
    pub listing: PostListView,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowContent>,
}

pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

/// Create and edit share one form.
pub struct PostFormContent {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub text_error: Option<String>,
    pub group_error: Option<String>,
    pub image_error: Option<String>,
}

impl PostFormContent {
    pub fn new(
        action: impl Into<String>,
        is_edit: bool,
        text: &str,
        selected_group: &str,
        groups: &[GroupRecord],
    ) -> Self {
        let selected_group = selected_group.trim();
        Self {
            is_edit,
            action: action.into(),
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| GroupOptionView {
                    id: group.id,
                    title: group.title.clone(),
                    selected: group.id.to_string() == selected_group,
                })
                .collect(),
            current_image: None,
            text_error: None,
            group_error: None,
            image_error: None,
        }
    }

    pub fn with_current_image(self, image: Option<&str>) -> Self {
        Self {
            current_image: image.map(media_href),
            ..self
        }
    }

    pub fn with_errors(self, errors: &FieldErrors) -> Self {
        Self {
            text_error: errors.get("text").map(str::to_string),
            group_error: errors.get("group").map(str::to_string),
            image_error: errors.get("image").map(str::to_string),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContent>,
}

pub struct LoginContent {
    pub username: String,
    pub next: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContent>,
}

pub struct SignupContent {
    pub username: String,
    pub username_error: Option<String>,
    pub password_error: Option<String>,
    pub confirmation_error: Option<String>,
}

impl SignupContent {
    pub fn new(username: &str, errors: &FieldErrors) -> Self {
        Self {
            username: username.to_string(),
            username_error: errors.get("username").map(str::to_string),
            password_error: errors.get("password").map(str::to_string),
            confirmation_error: errors.get("password_confirmation").map(str::to_string),
        }
    }
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContent>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn media_href(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

fn page_href(number: u64) -> String {
    format!("?page={number}")
}

fn format_human_date(value: OffsetDateTime) -> String {
    value
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

fn format_iso_date(value: OffsetDateTime) -> String {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(ISO_DATE_FORMAT)
        .unwrap_or_default()
}
