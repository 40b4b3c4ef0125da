//! Admin dashboard endpoints. Thin typed pass-throughs; the backend enforces
//! the admin role.
//!
//! Catalog writes drop the cached catalog once the backend accepts them.

use bookshop_core::{BookId, OrderId, OrderStatus, UserId};
use reqwest::Method;
use tracing::{info, instrument};

use super::types::{
    Book, BookRequest, OrderFilter, OrderListing, OrderResponse, Page, Pagination, SalesAnalytics,
};
use super::ApiClient;
use crate::error::ApiError;
use crate::session::Session;

impl ApiClient {
    /// One page of all customers' orders, optionally narrowed to one user.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn admin_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
        user_id: Option<UserId>,
        pagination: Pagination,
    ) -> Result<Page<OrderResponse>, ApiError> {
        let mut query = filter.to_query();
        if let Some(user_id) = user_id {
            query.push(("userId", user_id.to_string()));
        }
        let listing: OrderListing = self
            .fetch_json(Method::GET, "/admin/orders", Some(session), |r| {
                r.query(&query).query(&pagination.to_query())
            })
            .await?;
        Ok(listing.into_page())
    }

    /// Any order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session), fields(order_id = %id))]
    pub async fn admin_order(
        &self,
        session: &Session,
        id: OrderId,
    ) -> Result<OrderResponse, ApiError> {
        self.fetch_json(
            Method::GET,
            &format!("/admin/orders/{id}"),
            Some(session),
            |r| r,
        )
        .await
    }

    /// Move an order to `status`.
    ///
    /// The backend decides whether the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the transition is refused.
    #[instrument(skip(self, session), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        session: &Session,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderResponse, ApiError> {
        self.fetch_json(
            Method::PUT,
            &format!("/admin/orders/{id}/status"),
            Some(session),
            |r| r.query(&[("status", status.as_str())]),
        )
        .await
    }

    /// Sales dashboard figures.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn sales_analytics(&self, session: &Session) -> Result<SalesAnalytics, ApiError> {
        self.fetch_json(Method::GET, "/admin/analytics/sales", Some(session), |r| r)
            .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Add a book to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the backend refuses the book.
    #[instrument(skip(self, session, book), fields(title = %book.title))]
    pub async fn create_book(
        &self,
        session: &Session,
        book: &BookRequest,
    ) -> Result<Book, ApiError> {
        let created: Book = self
            .fetch_json(Method::POST, "/books", Some(session), |r| r.json(book))
            .await?;
        info!(book_id = %created.id, "Book created");
        self.invalidate_catalog().await;
        Ok(created)
    }

    /// Replace a book's details.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the book does not exist or the backend refuses
    /// the change.
    #[instrument(skip(self, session, book), fields(book_id = %id))]
    pub async fn update_book(
        &self,
        session: &Session,
        id: BookId,
        book: &BookRequest,
    ) -> Result<Book, ApiError> {
        let updated: Book = self
            .fetch_json(Method::PUT, &format!("/books/{id}"), Some(session), |r| {
                r.json(book)
            })
            .await?;
        info!("Book updated");
        self.invalidate_catalog().await;
        Ok(updated)
    }

    /// Remove a book from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the book does not exist or is still referenced.
    #[instrument(skip(self, session), fields(book_id = %id))]
    pub async fn delete_book(&self, session: &Session, id: BookId) -> Result<(), ApiError> {
        self.fetch_empty(Method::DELETE, &format!("/books/{id}"), Some(session), |r| r)
            .await?;
        info!("Book deleted");
        self.invalidate_catalog().await;
        Ok(())
    }
}
