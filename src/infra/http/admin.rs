//! Administrative listener: group management, post removal and cache control over JSON.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::info;

use crate::application::{
    groups::{CreateGroupCommand, GroupAdminService},
    repos::{HealthRepo, PostsWriteRepo},
};
use crate::infra::cache::PageCache;

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

const SOURCE: &str = "infra::http::admin";

#[derive(Clone)]
pub struct AdminState {
    pub groups: Arc<GroupAdminService>,
    pub posts: Arc<dyn PostsWriteRepo>,
    pub page_cache: PageCache,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{slug}", delete(delete_group))
        .route("/posts/{id}", delete(delete_post))
        .route("/cache/clear", post(clear_cache))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    description: String,
}

async fn list_groups(State(state): State<AdminState>) -> Response {
    match state.groups.list().await {
        Ok(groups) => Json(groups).into_response(),
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn create_group(
    State(state): State<AdminState>,
    Json(request): Json<CreateGroupRequest>,
) -> Response {
    let command = CreateGroupCommand {
        title: request.title,
        slug: request.slug,
        description: request.description,
    };

    match state.groups.create(command).await {
        Ok(group) => (StatusCode::CREATED, Json(group)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_group(State(state): State<AdminState>, Path(slug): Path<String>) -> Response {
    match state.groups.delete(&slug).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn delete_post(State(state): State<AdminState>, Path(id): Path<i64>) -> Response {
    match state.posts.delete_post(id).await {
        Ok(()) => {
            info!(target = SOURCE, post_id = id, "post deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn clear_cache(State(state): State<AdminState>) -> Response {
    state.page_cache.clear().await;
    info!(target = SOURCE, "page cache cleared");
    StatusCode::NO_CONTENT.into_response()
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.health_check().await)
}
