//! Catalog management service: authors and books.
//!
//! Copy counts on books are owned by the loan lifecycle once loans exist;
//! this service only validates them on create/update and refuses edits
//! that would break the `0 <= available <= owned` invariant.

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorSort, CreateAuthor, UpdateAuthor},
        book::{Book, BookQuery, BookSort, CreateBook, UpdateBook},
        SortOrder,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    lending: LendingConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, lending: LendingConfig) -> Self {
        Self {
            repository,
            lending,
        }
    }

    fn parse_sort<T: std::str::FromStr<Err = AppError> + Default>(
        raw: Option<&str>,
    ) -> AppResult<T> {
        raw.map(str::parse).transpose().map(Option::unwrap_or_default)
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    /// Create a new author; the exact first/last name pair must be unique
    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        if self
            .repository
            .authors
            .exists_by_name(&author.firstname, &author.lastname)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Author {} {} already exists",
                author.firstname, author.lastname
            )));
        }
        self.repository.authors.create(&author).await
    }

    /// Get an author together with their books
    pub async fn get_author(&self, id: i32) -> AppResult<(Author, Vec<Book>)> {
        let author = self.repository.authors.get_by_id(id).await?;
        let books = self.repository.books.get_by_author(id).await?;
        Ok((author, books))
    }

    /// Search authors by name fragment and country
    pub async fn search_authors(
        &self,
        name: Option<&str>,
        country: Option<&str>,
        sort_by: Option<&str>,
        order: Option<&str>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> AppResult<(Vec<Author>, i64)> {
        let (_, page_size, offset) =
            super::page_params(page, page_size, self.lending.max_page_size)?;
        let sort_by: AuthorSort = Self::parse_sort(sort_by)?;
        let order: SortOrder = Self::parse_sort(order)?;

        self.repository
            .authors
            .search(name, country, sort_by, order, offset, page_size)
            .await
    }

    /// Update an author; only the provided fields change
    pub async fn update_author(&self, id: i32, update: UpdateAuthor) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await?;
        self.repository.authors.update(id, &update).await
    }

    /// Delete an author without books
    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.get_by_id(id).await?;
        if self.repository.books.exists_for_author(id).await? {
            return Err(AppError::Conflict(
                "Cannot delete an author with associated books".to_string(),
            ));
        }
        self.repository.authors.delete(id).await
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// Create a new book; ISBN must be unique and the author must exist
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        if self.repository.books.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                book.isbn
            )));
        }
        self.repository.authors.get_by_id(book.author_id).await?;

        let nb_available = book.nb_available.unwrap_or(book.nb_owned);
        validate_copy_counts(book.nb_owned, nb_available)?;
        if book.pages <= 0 {
            return Err(AppError::BadRequest("pages must be > 0".to_string()));
        }

        self.repository.books.create(&book, nb_available).await
    }

    /// Get a book together with its author
    pub async fn get_book(&self, id: i32) -> AppResult<(Book, Author)> {
        let book = self.repository.books.get_by_id(id).await?;
        let author = self.repository.authors.get_by_id(book.author_id).await?;
        Ok((book, author))
    }

    /// List books with sorting
    pub async fn list_books(
        &self,
        sort_by: Option<&str>,
        order: Option<&str>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> AppResult<(Vec<Book>, i64)> {
        let (_, page_size, offset) =
            super::page_params(page, page_size, self.lending.max_page_size)?;
        let sort_by: BookSort = Self::parse_sort(sort_by)?;
        let order: SortOrder = Self::parse_sort(order)?;

        self.repository
            .books
            .list(sort_by, order, offset, page_size)
            .await
    }

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (_, page_size, offset) =
            super::page_params(query.page, query.page_size, self.lending.max_page_size)?;

        self.repository.books.search(query, offset, page_size).await
    }

    /// Update a book; only the provided fields change, and the resulting
    /// copy counts must keep the ledger invariant
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        let mut book = self.repository.books.get_by_id(id).await?;

        if let Some(ref isbn) = update.isbn {
            if self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
            book.isbn = isbn.clone();
        }
        if let Some(author_id) = update.author_id {
            self.repository.authors.get_by_id(author_id).await?;
            book.author_id = author_id;
        }
        if let Some(title) = update.title {
            book.title = title;
        }
        if let Some(year) = update.year {
            book.year = year;
        }
        if let Some(nb_owned) = update.nb_owned {
            book.nb_owned = nb_owned;
        }
        if let Some(nb_available) = update.nb_available {
            book.nb_available = nb_available;
        }
        if let Some(description) = update.description {
            book.description = Some(description);
        }
        if let Some(category) = update.category {
            book.category = Some(category);
        }
        if let Some(language) = update.language {
            book.language = language;
        }
        if let Some(pages) = update.pages {
            if pages <= 0 {
                return Err(AppError::BadRequest("pages must be > 0".to_string()));
            }
            book.pages = pages;
        }
        if let Some(house) = update.house {
            book.house = Some(house);
        }

        validate_copy_counts(book.nb_owned, book.nb_available)?;
        self.repository.books.update(id, &book).await
    }

    /// Delete a book with no loan records. Loan history is permanent, so a
    /// book that was ever lent out stays.
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.get_by_id(id).await?;
        if self.repository.books.has_loans(id).await? {
            return Err(AppError::Conflict(
                "Cannot delete a book with loan records".to_string(),
            ));
        }
        self.repository.books.delete(id).await
    }
}

fn validate_copy_counts(nb_owned: i32, nb_available: i32) -> AppResult<()> {
    if nb_owned < 0 {
        return Err(AppError::BadRequest("nb_owned must be >= 0".to_string()));
    }
    if nb_available < 0 || nb_available > nb_owned {
        return Err(AppError::BadRequest(
            "nb_available must be between 0 and nb_owned".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_counts_within_bounds() {
        assert!(validate_copy_counts(3, 0).is_ok());
        assert!(validate_copy_counts(3, 3).is_ok());
    }

    #[test]
    fn test_copy_counts_rejected() {
        assert!(validate_copy_counts(-1, 0).is_err());
        assert!(validate_copy_counts(3, 4).is_err());
        assert!(validate_copy_counts(3, -1).is_err());
    }
}
