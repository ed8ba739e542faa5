//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookSort, CreateBook},
        SortOrder,
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    /// Check whether a book with this ISBN exists, optionally excluding one id
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook, nb_available: i32) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, isbn, year, author_id, nb_owned, nb_available,
                description, category, language, pages, house
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.year)
        .bind(book.author_id)
        .bind(book.nb_owned)
        .bind(nb_available)
        .bind(&book.description)
        .bind(&book.category)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.house)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// List books with sorting and pagination
    pub async fn list(
        &self,
        sort_by: BookSort,
        order: SortOrder,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT * FROM books ORDER BY {} {} LIMIT $1 OFFSET $2",
            sort_by.as_column(),
            order.as_sql(),
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Search books with filters and pagination
    pub async fn search(&self, query: &BookQuery, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let filter = r#"
            ($1::text IS NULL OR title ILIKE '%' || $1 || '%')
            AND ($2::text IS NULL OR isbn = $2)
            AND ($3::text IS NULL OR category = $3)
            AND ($4::int IS NULL OR year = $4)
            AND ($5::text IS NULL OR language = $5)
            AND ($6::bool IS NULL OR ($6 AND nb_available > 0) OR (NOT $6 AND nb_available = 0))
            AND ($7::text IS NULL OR EXISTS (
                SELECT 1 FROM authors a
                WHERE a.id = books.author_id
                  AND (a.firstname ILIKE '%' || $7 || '%' OR a.lastname ILIKE '%' || $7 || '%')
            ))
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books WHERE {}", filter))
                .bind(&query.title)
                .bind(&query.isbn)
                .bind(&query.category)
                .bind(query.year)
                .bind(&query.language)
                .bind(query.available)
                .bind(&query.author_name)
                .fetch_one(&self.pool)
                .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT * FROM books WHERE {} ORDER BY title LIMIT $8 OFFSET $9",
            filter
        ))
        .bind(&query.title)
        .bind(&query.isbn)
        .bind(&query.category)
        .bind(query.year)
        .bind(&query.language)
        .bind(query.available)
        .bind(&query.author_name)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// All books by an author
    pub async fn get_by_author(&self, author_id: i32) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE author_id = $1 ORDER BY year, title",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Whether any book references this author
    pub async fn exists_for_author(&self, author_id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE author_id = $1)")
                .bind(author_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Whether any loan record (open or closed) references this book
    pub async fn has_loans(&self, book_id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE book_id = $1)")
                .bind(book_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Update a book's fields to the given resolved values
    pub async fn update(&self, id: i32, book: &Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $1, isbn = $2, year = $3, author_id = $4,
                nb_owned = $5, nb_available = $6, description = $7,
                category = $8, language = $9, pages = $10, house = $11
            WHERE id = $12
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.year)
        .bind(book.author_id)
        .bind(book.nb_owned)
        .bind(book.nb_available)
        .bind(&book.description)
        .bind(&book.category)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.house)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::BookNotFound(id))
    }

    /// Delete a book
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookNotFound(id));
        }
        Ok(())
    }
}
