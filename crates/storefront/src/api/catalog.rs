//! Book catalog reads (public, no session).

use bookshop_core::BookId;
use reqwest::Method;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::types::{Book, BookSearch};
use super::ApiClient;
use crate::error::ApiError;

impl ApiClient {
    /// Get every book in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_all_books(&self) -> Result<Vec<Book>, ApiError> {
        if let Some(cache) = &self.inner.cache
            && let Some(CacheValue::Books(books)) = cache.get(&CacheKey::AllBooks).await
        {
            debug!("Cache hit for catalog");
            return Ok(books);
        }

        let books: Vec<Book> = self
            .fetch_json(Method::GET, "/books/all", None, |r| r)
            .await?;

        if let Some(cache) = &self.inner.cache {
            cache
                .insert(CacheKey::AllBooks, CacheValue::Books(books.clone()))
                .await;
        }

        Ok(books)
    }

    /// Get a single book.
    ///
    /// # Errors
    ///
    /// Returns an error if the book does not exist or the API request fails.
    #[instrument(skip(self), fields(book_id = %id))]
    pub async fn get_book(&self, id: BookId) -> Result<Book, ApiError> {
        let key = CacheKey::Book(id);
        if let Some(cache) = &self.inner.cache
            && let Some(CacheValue::Book(book)) = cache.get(&key).await
        {
            debug!("Cache hit for book");
            return Ok(*book);
        }

        let book: Book = self
            .fetch_json(Method::GET, &format!("/books/{id}"), None, |r| r)
            .await?;

        if let Some(cache) = &self.inner.cache {
            cache
                .insert(key, CacheValue::Book(Box::new(book.clone())))
                .await;
        }

        Ok(book)
    }

    /// Search the catalog. Results are never cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search_books(&self, search: &BookSearch) -> Result<Vec<Book>, ApiError> {
        let query = search.to_query();
        self.fetch_json(Method::GET, "/books/search", None, |r| r.query(&query))
            .await
    }

    /// Drop every cached catalog entry.
    pub async fn invalidate_catalog(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.invalidate_all();
            cache.run_pending_tasks().await;
        }
    }
}
