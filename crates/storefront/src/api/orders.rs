//! Order store: placing orders and reading the user's order history.

use std::future::Future;

use bookshop_core::OrderId;
use reqwest::Method;
use tracing::instrument;

use super::types::{OrderFilter, OrderListing, OrderRequest, OrderResponse, Page, Pagination};
use super::ApiClient;
use crate::error::ApiError;
use crate::session::Session;

/// Remote order operations for the signed-in user.
pub trait OrderStore: Send + Sync {
    /// Place an order from the session's server-side cart.
    fn create_order(
        &self,
        session: &Session,
        request: &OrderRequest,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;

    /// One page of the user's orders. A bare-list answer comes back as a single page.
    fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> impl Future<Output = Result<Page<OrderResponse>, ApiError>> + Send;

    /// A single order.
    fn get_order(
        &self,
        session: &Session,
        id: OrderId,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;

    /// Mark a shipped order as delivered.
    fn confirm_received(
        &self,
        session: &Session,
        id: OrderId,
    ) -> impl Future<Output = Result<OrderResponse, ApiError>> + Send;
}

impl OrderStore for ApiClient {
    #[instrument(
        skip(self, session, request),
        fields(user_id = %session.identity().id, payment_method = %request.payment_method)
    )]
    async fn create_order(
        &self,
        session: &Session,
        request: &OrderRequest,
    ) -> Result<OrderResponse, ApiError> {
        self.fetch_json(Method::POST, "/orders", Some(session), |r| r.json(request))
            .await
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id))]
    async fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<OrderResponse>, ApiError> {
        let query = filter.to_query();
        let listing: OrderListing = self
            .fetch_json(Method::GET, "/orders", Some(session), |r| {
                r.query(&query).query(&pagination.to_query())
            })
            .await?;
        Ok(listing.into_page())
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id, order_id = %id))]
    async fn get_order(&self, session: &Session, id: OrderId) -> Result<OrderResponse, ApiError> {
        self.fetch_json(Method::GET, &format!("/orders/{id}"), Some(session), |r| r)
            .await
    }

    #[instrument(skip(self, session), fields(user_id = %session.identity().id, order_id = %id))]
    async fn confirm_received(
        &self,
        session: &Session,
        id: OrderId,
    ) -> Result<OrderResponse, ApiError> {
        self.fetch_json(
            Method::POST,
            &format!("/orders/{id}/confirm-received"),
            Some(session),
            |r| r,
        )
        .await
    }
}
