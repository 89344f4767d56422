use std::{io::ErrorKind, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, FromRef, FromRequestParts, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
        request::Parts,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::{
    Multipart,
    cookie::Key,
    multipart::MultipartRejection,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    application::{
        accounts::AccountService,
        error::HttpError,
        feed::{FeedError, FeedService},
        follows::{FollowError, FollowService},
        forms::FieldErrors,
        posts::{PostError, PostService, ValidPost},
    },
    domain::entities::{GroupRecord, UserRecord},
    infra::{
        cache::PageCache,
        uploads::{POST_IMAGE_PREFIX, UploadStorage, UploadStorageError},
    },
    presentation::views::{
        FollowContent, FollowTemplate, GroupContent, GroupTemplate, IndexContent, IndexTemplate,
        LayoutChrome, LayoutContext, PostDetailContent, PostDetailTemplate, PostFormContent,
        PostFormTemplate, PostListView, ProfileContent, ProfileTemplate, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{self, CurrentUser, RequireUser},
    forms::{ImageUpload, PostFormError, PostSubmission, check_image, read_post_submission},
    middleware::{log_responses, page_cache_layer, set_request_context},
    redirect_found, repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub upload_storage: Arc<UploadStorage>,
    pub upload_limit_bytes: usize,
    pub page_cache: PageCache,
    pub session_key: Key,
}

impl FromRef<HttpState> for Key {
    fn from_ref(state: &HttpState) -> Self {
        state.session_key.clone()
    }
}

pub fn build_router(state: HttpState) -> Router {
    // The index is rendered with anonymous chrome so one cached copy serves everyone.
    let cached_routes = Router::new()
        .route("/", get(index))
        .layer(middleware::from_fn_with_state(
            state.page_cache.clone(),
            page_cache_layer,
        ));

    let authoring_routes = Router::new()
        .route("/create/", get(post_create_form).post(post_create))
        .route("/posts/{id}/edit/", get(post_edit_form).post(post_edit))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes));

    let routes = Router::new()
        .route("/group/{slug}/", get(group_list))
        .route("/profile/{username}/", get(profile))
        .route(
            "/profile/{username}/follow/",
            get(profile_follow).post(profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(profile_unfollow).post(profile_unfollow),
        )
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/follow/", get(follow_index))
        .route("/auth/login/", get(auth::login_form).post(auth::login_submit))
        .route(
            "/auth/signup/",
            get(auth::signup_form).post(auth::signup_submit),
        )
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .fallback(fallback);

    cached_routes
        .merge(authoring_routes)
        .merge(routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Post id taken from the path. Anything but a plain decimal id renders the not-found page.
struct PostId(i64);

impl FromRequestParts<HttpState> for PostId {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match parse_post_id(&raw) {
            Some(id) => Ok(Self(id)),
            None => {
                let current = CurrentUser::from_request_parts(parts, state).await?;
                Err(render_not_found_response(current.chrome()))
            }
        }
    }
}

fn parse_post_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentForm {
    text: String,
}

async fn index(State(state): State<HttpState>, Query(query): Query<PageQuery>) -> Response {
    let chrome = LayoutChrome::anonymous();
    match state.feed.index(query.page.as_deref()).await {
        Ok(page) => {
            let content = IndexContent {
                listing: PostListView::from_page(&page),
            };
            let view = LayoutContext::new(chrome.with_title("Latest posts"), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn group_list(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = current.chrome();
    match state.feed.group(&slug, query.page.as_deref()).await {
        Ok((group, page)) => {
            let content = GroupContent::new(&group, &page);
            let view = LayoutContext::new(chrome.with_title(&group.title), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = current.chrome();
    let viewer = current.0.as_ref().map(|user| user.id);
    match state
        .feed
        .profile(&username, viewer, query.page.as_deref())
        .await
    {
        Ok(listing) => {
            let content = ProfileContent::new(
                &listing.author,
                listing.posts_count,
                listing.following,
                &listing.page,
            );
            let title = format!("Profile of {}", listing.author.username);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    current: CurrentUser,
    PostId(id): PostId,
) -> Response {
    let chrome = current.chrome();
    match state.feed.post_detail(id).await {
        Ok(detail) => {
            let content = PostDetailContent::new(
                &detail.post,
                detail.author_posts_count,
                &detail.comments,
                current.0.as_ref(),
            );
            let title = format!("Post {}", content.title);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::for_viewer(Some(&user));
    match state.feed.follow_feed(user.id, query.page.as_deref()).await {
        Ok(page) => {
            let content = FollowContent {
                listing: PostListView::from_page(&page),
            };
            let view = LayoutContext::new(chrome.with_title("Following"), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(user.id, &username).await {
        Ok((author, _outcome)) => redirect_found(&profile_href(&author.username)),
        Err(err) => follow_error_to_response(err, &user),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(user.id, &username).await {
        Ok(author) => redirect_found(&profile_href(&author.username)),
        Err(err) => follow_error_to_response(err, &user),
    }
}

async fn post_create_form(State(state): State<HttpState>, RequireUser(user): RequireUser) -> Response {
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err, &user, None),
    };
    let content = PostFormContent::new("/create/", false, "", "", &groups);
    render_post_form(&user, content)
}

async fn post_create(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let submission = match read_multipart_submission(multipart).await {
        Ok(submission) => submission,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let (post, image) = match validate_submission(&state, &submission).await {
        Ok(valid) => valid,
        Err(PostError::Invalid(errors)) => {
            return rerender_post_form(&state, &user, "/create/", false, &submission, &errors, None)
                .await;
        }
        Err(err) => return post_error_to_response(err, &user, None),
    };

    let image = match store_image(&state, image).await {
        Ok(image) => image,
        Err(response) => return response,
    };

    match state.posts.create(user.id, post, image.clone()).await {
        Ok(_) => redirect_found(&profile_href(&user.username)),
        Err(err) => {
            discard_image(&state, image.as_deref()).await;
            post_error_to_response(err, &user, None)
        }
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    PostId(id): PostId,
) -> Response {
    let post = match state.posts.load_for_edit(id, user.id).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, &user, Some(id)),
    };
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err, &user, Some(id)),
    };

    let selected = post
        .group
        .as_ref()
        .map(|group| group.id.to_string())
        .unwrap_or_default();
    let content = PostFormContent::new(
        format!("/posts/{id}/edit/"),
        true,
        &post.body.text,
        &selected,
        &groups,
    )
    .with_current_image(post.image.as_deref());
    render_post_form(&user, content)
}

async fn post_edit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    PostId(id): PostId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    // The author guard runs before the body is looked at.
    let existing = match state.posts.load_for_edit(id, user.id).await {
        Ok(post) => post,
        Err(err) => return post_error_to_response(err, &user, Some(id)),
    };

    let submission = match read_multipart_submission(multipart).await {
        Ok(submission) => submission,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let action = format!("/posts/{id}/edit/");
    let (post, image) = match validate_submission(&state, &submission).await {
        Ok(valid) => valid,
        Err(PostError::Invalid(errors)) => {
            return rerender_post_form(
                &state,
                &user,
                &action,
                true,
                &submission,
                &errors,
                existing.image.as_deref(),
            )
            .await;
        }
        Err(err) => return post_error_to_response(err, &user, Some(id)),
    };

    let image = match store_image(&state, image).await {
        Ok(image) => image,
        Err(response) => return response,
    };

    match state.posts.update(id, user.id, post, image.clone()).await {
        Ok(_) => redirect_found(&post_href(id)),
        Err(err) => {
            discard_image(&state, image.as_deref()).await;
            post_error_to_response(err, &user, Some(id))
        }
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    PostId(id): PostId,
    Form(form): Form<CommentForm>,
) -> Response {
    match state.posts.add_comment(id, user.id, &form.text).await {
        // An invalid comment is dropped and the reader lands back on the post.
        Ok(_) | Err(PostError::Invalid(_)) => redirect_found(&post_href(id)),
        Err(err) => post_error_to_response(err, &user, Some(id)),
    }
}

async fn read_multipart_submission(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PostSubmission, PostFormError> {
    let mut multipart =
        multipart.map_err(|rejection| PostFormError::Invalid(rejection.body_text()))?;
    read_post_submission(&mut multipart).await
}

/// Validate text, group and image together so every field error is reported at once.
async fn validate_submission<'a>(
    state: &HttpState,
    submission: &'a PostSubmission,
) -> Result<(ValidPost, Option<&'a ImageUpload>), PostError> {
    let image_check = submission.image.as_ref().map(check_image).transpose();
    match (state.posts.validate(&submission.input).await, image_check) {
        (Ok(post), Ok(_)) => Ok((post, submission.image.as_ref())),
        (Err(PostError::Invalid(mut errors)), image_check) => {
            if let Err(message) = image_check {
                errors.push("image", message);
            }
            Err(PostError::Invalid(errors))
        }
        (Ok(_), Err(message)) => {
            let mut errors = FieldErrors::new();
            errors.push("image", message);
            Err(PostError::Invalid(errors))
        }
        (Err(err), _) => Err(err),
    }
}

async fn store_image(
    state: &HttpState,
    image: Option<&ImageUpload>,
) -> Result<Option<String>, Response> {
    let Some(image) = image else {
        return Ok(None);
    };

    match state
        .upload_storage
        .store(POST_IMAGE_PREFIX, &image.filename, image.data.clone())
        .await
    {
        Ok(stored) => {
            info!(
                target = "yatube::http::uploads",
                stored_path = %stored.stored_path,
                checksum = %stored.checksum,
                size_bytes = stored.size_bytes,
                "post image stored"
            );
            Ok(Some(stored.stored_path))
        }
        Err(err) => Err(HttpError::from_error(
            "infra::http::public::store_image",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store uploaded image",
            &err,
        )
        .into_response()),
    }
}

/// Remove an image stored for a post write that did not go through.
async fn discard_image(state: &HttpState, stored_path: Option<&str>) {
    let Some(stored_path) = stored_path else {
        return;
    };
    if let Err(err) = state.upload_storage.delete(stored_path).await {
        warn!(
            target = "yatube::http::uploads",
            stored_path,
            error = %err,
            "failed to remove orphaned image"
        );
    }
}

async fn rerender_post_form(
    state: &HttpState,
    user: &UserRecord,
    action: &str,
    is_edit: bool,
    submission: &PostSubmission,
    errors: &FieldErrors,
    current_image: Option<&str>,
) -> Response {
    let groups: Vec<GroupRecord> = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err, user, None),
    };
    let content = PostFormContent::new(
        action,
        is_edit,
        &submission.input.text,
        &submission.input.group,
        &groups,
    )
    .with_current_image(current_image)
    .with_errors(errors);
    render_post_form(user, content)
}

fn render_post_form(user: &UserRecord, content: PostFormContent) -> Response {
    let title = if content.is_edit { "Edit post" } else { "New post" };
    let chrome = LayoutChrome::for_viewer(Some(user)).with_title(title);
    let view = LayoutContext::new(chrome, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored file"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );
    response
}

async fn fallback(current: CurrentUser) -> Response {
    render_not_found_response(current.chrome())
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::NotFound(_) => render_not_found_response(chrome),
        FeedError::Repo(err) => {
            repo_error_to_http("infra::http::public::feed", err).into_response()
        }
    }
}

fn follow_error_to_response(err: FollowError, user: &UserRecord) -> Response {
    match err {
        FollowError::UnknownAuthor | FollowError::NotFollowing => {
            render_not_found_response(LayoutChrome::for_viewer(Some(user)))
        }
        FollowError::Repo(err) => {
            repo_error_to_http("infra::http::public::follows", err).into_response()
        }
    }
}

/// `post_id` is where a non-author is sent back to.
fn post_error_to_response(err: PostError, user: &UserRecord, post_id: Option<i64>) -> Response {
    match err {
        PostError::NotFound => render_not_found_response(LayoutChrome::for_viewer(Some(user))),
        PostError::NotAuthor => match post_id {
            Some(id) => redirect_found(&post_href(id)),
            None => redirect_found("/"),
        },
        PostError::Invalid(errors) => HttpError::new(
            "infra::http::public::posts",
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            errors.to_string(),
        )
        .into_response(),
        PostError::Repo(err) => {
            repo_error_to_http("infra::http::public::posts", err).into_response()
        }
    }
}
