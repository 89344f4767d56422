use async_trait::async_trait;

use crate::application::repos::{
    CreatePostParams, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::super::{PostgresRepositories, map_sqlx_error};
use super::types::{POST_COLUMNS, PostRow};

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            text,
            group_id,
            image,
        } = params;

        let sql = format!(
            "WITH p AS ( \
                INSERT INTO posts (author_id, text, group_id, image) \
                VALUES ($1, $2, $3, $4) \
                RETURNING * \
             ) \
             SELECT {POST_COLUMNS} \
             FROM p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id"
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(author_id)
            .bind(text)
            .bind(group_id)
            .bind(image)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            text,
            group_id,
            image,
        } = params;

        let sql = format!(
            "WITH p AS ( \
                UPDATE posts \
                SET text = $2, group_id = $3, image = COALESCE($4, image) \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {POST_COLUMNS} \
             FROM p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id"
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(text)
            .bind(group_id)
            .bind(image)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
