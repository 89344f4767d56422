use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::{CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::{derive_slug, validate_slug};

const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

/// Group management for the administrative listener.
#[derive(Clone)]
pub struct GroupAdminService {
    groups: Arc<dyn GroupsRepo>,
    writes: Arc<dyn GroupsWriteRepo>,
}

impl GroupAdminService {
    pub fn new(groups: Arc<dyn GroupsRepo>, writes: Arc<dyn GroupsWriteRepo>) -> Self {
        Self { groups, writes }
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.groups.list_groups().await
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, AppError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title", "title is required").into());
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::validation(
                "title",
                format!("title exceeds {TITLE_MAX_CHARS} characters"),
            )
            .into());
        }

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => validate_slug(slug),
            _ => derive_slug(&title),
        }
        .map_err(|err| DomainError::validation("slug", err.to_string()))?;

        let group = self
            .writes
            .create_group(CreateGroupParams {
                title,
                slug,
                description: command.description.trim().to_string(),
            })
            .await?;

        info!(
            target = "yatube::application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    pub async fn delete(&self, slug: &str) -> Result<(), RepoError> {
        self.writes.delete_group(slug).await?;
        info!(
            target = "yatube::application::groups",
            slug = %slug,
            "group deleted"
        );
        Ok(())
    }
}
