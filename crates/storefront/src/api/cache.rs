//! Cache types for catalog responses.

use bookshop_core::BookId;

use super::types::Book;

/// Cache key for catalog reads.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    AllBooks,
    Book(BookId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Books(Vec<Book>),
    Book(Box<Book>),
}
