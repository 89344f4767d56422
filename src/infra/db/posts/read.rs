use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::application::pagination::PageWindow;
use crate::application::repos::{PostScope, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;

use super::super::{PostgresRepositories, map_sqlx_error};
use super::types::{POST_COLUMNS, PostRow};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        Self::apply_scope(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let limit = Self::convert_window_bound(window.limit())?;
        let offset = Self::convert_window_bound(window.offset())?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(
            " FROM posts p \
              INNER JOIN users u ON u.id = p.author_id \
              LEFT JOIN groups g ON g.id = p.group_id",
        );
        Self::apply_scope(&mut qb, scope);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id \
             WHERE p.id = $1"
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}
