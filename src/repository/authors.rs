//! Authors repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorSort, CreateAuthor, UpdateAuthor},
        SortOrder,
    },
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::AuthorNotFound(id))
    }

    /// Check whether an author with this exact name already exists
    pub async fn exists_by_name(&self, firstname: &str, lastname: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM authors WHERE firstname = $1 AND lastname = $2)",
        )
        .bind(firstname)
        .bind(lastname)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a new author
    pub async fn create(&self, author: &CreateAuthor) -> AppResult<Author> {
        let created = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (firstname, lastname, birth, country, bio, death, website)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&author.firstname)
        .bind(&author.lastname)
        .bind(author.birth)
        .bind(&author.country)
        .bind(&author.bio)
        .bind(author.death)
        .bind(&author.website)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Search authors by name fragment and country, with pagination
    pub async fn search(
        &self,
        name: Option<&str>,
        country: Option<&str>,
        sort_by: AuthorSort,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Author>, i64)> {
        let filter = r#"
            ($1::text IS NULL OR firstname ILIKE '%' || $1 || '%' OR lastname ILIKE '%' || $1 || '%')
            AND ($2::text IS NULL OR country = $2)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM authors WHERE {}", filter))
                .bind(name)
                .bind(country)
                .fetch_one(&self.pool)
                .await?;

        let authors = sqlx::query_as::<_, Author>(&format!(
            "SELECT * FROM authors WHERE {} ORDER BY {} {} LIMIT $3 OFFSET $4",
            filter,
            sort_by.as_column(),
            order.as_sql(),
        ))
        .bind(name)
        .bind(country)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((authors, total))
    }

    /// Update an author; absent fields keep their current value
    pub async fn update(&self, id: i32, update: &UpdateAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET
                firstname = COALESCE($1, firstname),
                lastname = COALESCE($2, lastname),
                birth = COALESCE($3, birth),
                country = COALESCE($4, country),
                bio = COALESCE($5, bio),
                death = COALESCE($6, death),
                website = COALESCE($7, website)
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&update.firstname)
        .bind(&update.lastname)
        .bind(update.birth)
        .bind(&update.country)
        .bind(&update.bio)
        .bind(update.death)
        .bind(&update.website)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::AuthorNotFound(id))
    }

    /// Delete an author
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AuthorNotFound(id));
        }
        Ok(())
    }
}
