//! Signed-cookie sessions, the login/signup/logout pages and the extractors that read them.

use axum::{
    Form,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use serde::Deserialize;
use tracing::info;
use url::form_urlencoded;

use crate::application::accounts::{AccountError, INVALID_LOGIN_MESSAGE, SignupInput};
use crate::application::forms::FieldErrors;
use crate::domain::entities::UserRecord;
use crate::presentation::views::{
    LayoutChrome, LayoutContext, LoginContent, LoginTemplate, SignupContent, SignupTemplate,
    render_template_response,
};

use super::{public::HttpState, redirect_found, repo_error_to_http};

pub const SESSION_COOKIE: &str = "yatube_session";
const LOGIN_PATH: &str = "/auth/login/";
const SOURCE: &str = "infra::http::auth";

/// The signed-in user, if any.
pub struct CurrentUser(pub Option<UserRecord>);

impl CurrentUser {
    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome::for_viewer(self.0.as_ref())
    }
}

impl FromRequestParts<HttpState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, state.session_key.clone());
        let Some(user_id) = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| cookie.value().parse::<i64>().ok())
        else {
            return Ok(Self(None));
        };

        match state.accounts.find_user(user_id).await {
            Ok(user) => Ok(Self(user)),
            Err(err) => Err(account_error_response(err)),
        }
    }
}

/// A signed-in user; anyone else is sent to the login page with `next` set to this request.
pub struct RequireUser(pub UserRecord);

impl FromRequestParts<HttpState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(user)) => Ok(Self(user)),
            CurrentUser(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                Err(redirect_found(&login_url(&next)))
            }
        }
    }
}

pub fn login_url(next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

fn session_cookie(user_id: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, user_id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    username: String,
    password: String,
    password_confirmation: String,
}

pub(super) async fn login_form(current: CurrentUser, Query(query): Query<NextQuery>) -> Response {
    let content = LoginContent {
        username: String::new(),
        next: safe_next(query.next.as_deref()).map(str::to_string),
        error: None,
    };
    let view = LayoutContext::new(current.chrome().with_title("Log in"), content);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state
        .accounts
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            info!(target = SOURCE, user_id = user.id, "user logged in");
            let jar = jar.add(session_cookie(user.id));
            let target = safe_next(form.next.as_deref()).unwrap_or("/");
            (jar, redirect_found(target)).into_response()
        }
        Err(AccountError::InvalidCredentials) => {
            let content = LoginContent {
                username: form.username.trim().to_string(),
                next: safe_next(form.next.as_deref()).map(str::to_string),
                error: Some(INVALID_LOGIN_MESSAGE.to_string()),
            };
            let view = LayoutContext::new(LayoutChrome::anonymous().with_title("Log in"), content);
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => account_error_response(err),
    }
}

pub(super) async fn signup_form(current: CurrentUser) -> Response {
    let content = SignupContent::new("", &FieldErrors::new());
    let view = LayoutContext::new(current.chrome().with_title("Sign up"), content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let username = form.username.clone();
    let input = SignupInput {
        username: form.username,
        password: form.password,
        password_confirmation: form.password_confirmation,
    };

    match state.accounts.signup(input).await {
        Ok(user) => {
            let jar = jar.add(session_cookie(user.id));
            (jar, redirect_found("/")).into_response()
        }
        Err(AccountError::Invalid(errors)) => {
            let content = SignupContent::new(username.trim(), &errors);
            let view =
                LayoutContext::new(LayoutChrome::anonymous().with_title("Sign up"), content);
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(err) => account_error_response(err),
    }
}

pub(super) async fn logout(jar: SignedCookieJar) -> Response {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, redirect_found("/")).into_response()
}

fn account_error_response(err: AccountError) -> Response {
    match err {
        AccountError::Repo(err) => repo_error_to_http(SOURCE, err).into_response(),
        other => crate::application::error::HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Account request failed",
            &other,
        )
        .into_response(),
    }
}
