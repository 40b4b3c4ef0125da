//! Cart store: the server-held, session-scoped cart.

use std::future::Future;

use bookshop_core::BookId;
use reqwest::Method;
use tracing::instrument;

use super::types::{CartItemRequest, CartResponse, QuantityRequest};
use super::ApiClient;
use crate::error::ApiError;
use crate::session::Session;

/// Remote cart operations.
///
/// Every mutation answers with the full authoritative cart, except
/// [`clear_cart`](Self::clear_cart) whose body is not relied upon.
pub trait CartStore: Send + Sync {
    /// Load the cart.
    fn get_cart(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<CartResponse, ApiError>> + Send;

    /// Add `quantity` of a book. Merging with an existing line happens server-side.
    fn add_item(
        &self,
        session: &Session,
        book_id: BookId,
        quantity: u32,
    ) -> impl Future<Output = Result<CartResponse, ApiError>> + Send;

    /// Set a line's quantity. Callers never send zero.
    fn set_item_quantity(
        &self,
        session: &Session,
        book_id: BookId,
        quantity: u32,
    ) -> impl Future<Output = Result<CartResponse, ApiError>> + Send;

    /// Remove a line.
    fn remove_item(
        &self,
        session: &Session,
        book_id: BookId,
    ) -> impl Future<Output = Result<CartResponse, ApiError>> + Send;

    /// Empty the cart.
    fn clear_cart(&self, session: &Session) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl CartStore for ApiClient {
    #[instrument(skip(self, session), fields(user_id = %session.identity().id))]
    async fn get_cart(&self, session: &Session) -> Result<CartResponse, ApiError> {
        self.fetch_json(Method::GET, "/cart", Some(session), |r| r)
            .await
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id, book_id = %book_id))]
    async fn add_item(
        &self,
        session: &Session,
        book_id: BookId,
        quantity: u32,
    ) -> Result<CartResponse, ApiError> {
        let body = CartItemRequest { book_id, quantity };
        self.fetch_json(Method::POST, "/cart/item", Some(session), |r| r.json(&body))
            .await
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id, book_id = %book_id))]
    async fn set_item_quantity(
        &self,
        session: &Session,
        book_id: BookId,
        quantity: u32,
    ) -> Result<CartResponse, ApiError> {
        let body = QuantityRequest { quantity };
        self.fetch_json(
            Method::PUT,
            &format!("/cart/item/{book_id}"),
            Some(session),
            |r| r.json(&body),
        )
        .await
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id, book_id = %book_id))]
    async fn remove_item(
        &self,
        session: &Session,
        book_id: BookId,
    ) -> Result<CartResponse, ApiError> {
        self.fetch_json(
            Method::DELETE,
            &format!("/cart/item/{book_id}"),
            Some(session),
            |r| r,
        )
        .await
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id))]
    async fn clear_cart(&self, session: &Session) -> Result<(), ApiError> {
        self.fetch_empty(Method::DELETE, "/cart", Some(session), |r| r)
            .await
    }
}
