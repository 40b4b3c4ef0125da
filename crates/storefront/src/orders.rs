//! Order history: filtered, paginated listing and receipt confirmation.

use bookshop_core::{OrderId, OrderStatus};
use tracing::{info, instrument};

use crate::api::{OrderFilter, OrderResponse, OrderStore, Pagination};
use crate::error::{ApiError, add_breadcrumb, report};
use crate::scope::Scope;
use crate::session::SessionHandle;

const LOAD_FAILED: &str = "Failed to load your orders. Please try again.";
const CONFIRM_FAILED: &str = "Failed to confirm order receipt. Please try again.";

/// One user's order list, as currently loaded.
pub struct OrderHistory<O> {
    store: O,
    session: SessionHandle,
    filter: OrderFilter,
    pagination: Pagination,
    orders: Vec<OrderResponse>,
    total_elements: u64,
    total_pages: u32,
    last_error: Option<String>,
    scope: Scope,
}

impl<O: OrderStore> OrderHistory<O> {
    /// An empty history; call [`Self::load`] to populate it.
    #[must_use]
    pub fn new(store: O, session: SessionHandle) -> Self {
        Self {
            store,
            session,
            filter: OrderFilter::default(),
            pagination: Pagination::default(),
            orders: Vec::new(),
            total_elements: 0,
            total_pages: 0,
            last_error: None,
            scope: Scope::new(),
        }
    }

    /// Start from `filter` instead of no filter. Nothing is loaded.
    #[must_use]
    pub fn with_filter(mut self, filter: OrderFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Start from `pagination` instead of the first page of ten.
    #[must_use]
    pub const fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub const fn filter(&self) -> &OrderFilter {
        &self.filter
    }

    #[must_use]
    pub const fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Orders on the loaded page.
    #[must_use]
    pub fn orders(&self) -> &[OrderResponse] {
        &self.orders
    }

    /// Loaded orders that have not been delivered yet.
    pub fn current_orders(&self) -> impl Iterator<Item = &OrderResponse> {
        self.orders
            .iter()
            .filter(|order| order.status != OrderStatus::Delivered)
    }

    /// Loaded orders that have been delivered.
    pub fn delivered_orders(&self) -> impl Iterator<Item = &OrderResponse> {
        self.orders
            .iter()
            .filter(|order| order.status == OrderStatus::Delivered)
    }

    #[must_use]
    pub const fn total_elements(&self) -> u64 {
        self.total_elements
    }

    #[must_use]
    pub const fn total_pages(&self) -> u32 {
        self.total_pages
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope.clone()
    }

    /// Fetch the current page with the current filter.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; the previously loaded page is kept.
    #[instrument(skip(self), fields(page = self.pagination.page, size = self.pagination.size))]
    pub async fn load(&mut self) -> Result<(), ApiError> {
        let session = self.session.current().ok_or(ApiError::Unauthorized)?;
        self.last_error = None;
        let result = self
            .store
            .list_orders(&session, &self.filter, self.pagination)
            .await;

        if !self.scope.is_live() {
            return result.map(drop);
        }

        match result {
            Ok(page) => {
                self.pagination.page = page.number;
                self.total_elements = page.total_elements;
                self.total_pages = page.total_pages;
                self.orders = page.content;
                Ok(())
            }
            Err(err) => {
                if !err.is_unauthorized() {
                    report("orders.load", &err);
                    self.last_error = Some(err.user_message(LOAD_FAILED));
                }
                Err(err)
            }
        }
    }

    /// Load a zero-based page.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub async fn go_to_page(&mut self, page: u32) -> Result<(), ApiError> {
        self.pagination.page = page;
        self.load().await
    }

    /// Change the page size and return to the first page.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub async fn set_page_size(&mut self, size: u32) -> Result<(), ApiError> {
        self.pagination = Pagination {
            page: 0,
            size: size.max(1),
        };
        self.load().await
    }

    /// Replace the filter and return to the first page.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub async fn apply_filter(&mut self, filter: OrderFilter) -> Result<(), ApiError> {
        self.filter = filter;
        self.pagination.page = 0;
        self.load().await
    }

    /// Drop every filter criterion and return to the first page.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub async fn clear_filter(&mut self) -> Result<(), ApiError> {
        self.apply_filter(OrderFilter::default()).await
    }

    /// Whether the confirm-received action should be offered for `order`.
    #[must_use]
    pub const fn can_confirm(order: &OrderResponse) -> bool {
        order.status.can_confirm_receipt()
    }

    /// Confirm a shipped order has arrived.
    ///
    /// The backend decides whether the transition is allowed. Only after it
    /// accepts is the local copy patched to `DELIVERED`; the page is then
    /// reloaded to pick up the authoritative state.
    ///
    /// # Errors
    ///
    /// Returns the confirm failure; nothing local changes. A failure of the
    /// follow-up reload is recorded in [`Self::last_error`] but not returned.
    #[instrument(skip(self))]
    pub async fn confirm_received(&mut self, order_id: OrderId) -> Result<(), ApiError> {
        let session = self.session.current().ok_or(ApiError::Unauthorized)?;
        self.last_error = None;
        let id = order_id.to_string();
        add_breadcrumb("orders", "Confirm received", Some(&[("order_id", id.as_str())]));
        let result = self.store.confirm_received(&session, order_id).await;

        if !self.scope.is_live() {
            return result.map(drop);
        }

        if let Err(err) = result {
            if !err.is_unauthorized() {
                report("orders.confirm_received", &err);
                self.last_error = Some(err.user_message(CONFIRM_FAILED));
            }
            return Err(err);
        }

        info!(%order_id, "Order confirmed as received");
        if let Some(order) = self.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = OrderStatus::Delivered;
        }
        // Reload errors are already recorded by `load`.
        let _ = self.load().await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use bookshop_core::{Price, UserId};

    use super::*;
    use crate::api::{OrderRequest, Page};
    use crate::session::Session;
    use crate::session::tests::test_session;

    fn order(id: i64, status: OrderStatus) -> OrderResponse {
        OrderResponse {
            id: OrderId::new(id),
            user_id: Some(UserId::new(1)),
            order_date: None,
            total_amount: Price::from_cents(2500),
            status,
            items: Vec::new(),
            shipping_info: None,
            payment_method: None,
        }
    }

    #[derive(Default)]
    struct FakeOrderStore {
        orders: Mutex<Vec<OrderResponse>>,
        queries: Mutex<Vec<(OrderFilter, Pagination)>>,
        confirm_error: Mutex<Option<ApiError>>,
        list_error: Mutex<Option<ApiError>>,
    }

    impl FakeOrderStore {
        fn with_orders(orders: Vec<OrderResponse>) -> Self {
            Self {
                orders: Mutex::new(orders),
                ..Self::default()
            }
        }
    }

    impl OrderStore for FakeOrderStore {
        async fn create_order(
            &self,
            _session: &Session,
            _request: &OrderRequest,
        ) -> Result<OrderResponse, ApiError> {
            unreachable!("not used by order history")
        }

        async fn list_orders(
            &self,
            _session: &Session,
            filter: &OrderFilter,
            pagination: Pagination,
        ) -> Result<Page<OrderResponse>, ApiError> {
            self.queries.lock().unwrap().push((filter.clone(), pagination));
            if let Some(err) = self.list_error.lock().unwrap().take() {
                return Err(err);
            }
            let all = self.orders.lock().unwrap().clone();
            let size = pagination.size as usize;
            let content: Vec<_> = all
                .iter()
                .filter(|o| filter.status.is_none_or(|s| o.status == s))
                .skip(pagination.page as usize * size)
                .take(size)
                .cloned()
                .collect();
            let total = all.len() as u64;
            Ok(Page {
                empty: content.is_empty(),
                content,
                total_elements: total,
                total_pages: u32::try_from(total.div_ceil(u64::from(pagination.size))).unwrap(),
                size: pagination.size,
                number: pagination.page,
                first: pagination.page == 0,
                last: false,
            })
        }

        async fn get_order(
            &self,
            _session: &Session,
            id: OrderId,
        ) -> Result<OrderResponse, ApiError> {
            let orders = self.orders.lock().unwrap();
            orders.iter().find(|o| o.id == id).cloned().ok_or(ApiError::Rejected {
                status: 404,
                message: None,
            })
        }

        async fn confirm_received(
            &self,
            _session: &Session,
            id: OrderId,
        ) -> Result<OrderResponse, ApiError> {
            if let Some(err) = self.confirm_error.lock().unwrap().take() {
                return Err(err);
            }
            let mut orders = self.orders.lock().unwrap();
            let order = orders.iter_mut().find(|o| o.id == id).unwrap();
            order.status = OrderStatus::Delivered;
            Ok(order.clone())
        }
    }

    fn history(store: FakeOrderStore) -> OrderHistory<FakeOrderStore> {
        OrderHistory::new(store, SessionHandle::with_session(test_session(1)))
    }

    #[tokio::test]
    async fn test_load_and_paginate() {
        let orders = (1..=25).map(|id| order(id, OrderStatus::Pending)).collect();
        let mut history = history(FakeOrderStore::with_orders(orders));

        history.load().await.unwrap();
        assert_eq!(history.orders().len(), 10);
        assert_eq!(history.total_elements(), 25);
        assert_eq!(history.total_pages(), 3);

        history.go_to_page(2).await.unwrap();
        assert_eq!(history.orders().len(), 5);
        assert_eq!(history.pagination().page, 2);

        history.set_page_size(20).await.unwrap();
        assert_eq!(history.pagination(), Pagination { page: 0, size: 20 });
        assert_eq!(history.orders().len(), 20);
    }

    #[tokio::test]
    async fn test_filter_resets_page_and_is_sent() {
        let orders = vec![order(1, OrderStatus::Pending), order(2, OrderStatus::Shipped)];
        let mut history = history(FakeOrderStore::with_orders(orders));
        history.go_to_page(3).await.unwrap();

        let filter = OrderFilter {
            status: Some(OrderStatus::Shipped),
            ..OrderFilter::default()
        };
        history.apply_filter(filter.clone()).await.unwrap();
        assert_eq!(history.pagination().page, 0);
        assert_eq!(history.orders().len(), 1);

        history.clear_filter().await.unwrap();
        let queries = history.store.queries.lock().unwrap().clone();
        assert_eq!(queries[1].0, filter);
        assert!(queries[2].0.is_empty());
        assert_eq!(queries[2].1.page, 0);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_page() {
        let store = FakeOrderStore::with_orders(vec![order(1, OrderStatus::Pending)]);
        let mut history = history(store);
        history.load().await.unwrap();

        *history.store.list_error.lock().unwrap() =
            Some(ApiError::Network("timed out".to_string()));
        history.load().await.unwrap_err();

        assert_eq!(history.orders().len(), 1);
        assert_eq!(
            history.last_error(),
            Some(crate::error::NETWORK_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_confirm_received_patches_then_reloads() {
        let store = FakeOrderStore::with_orders(vec![
            order(1, OrderStatus::Shipped),
            order(2, OrderStatus::Pending),
        ]);
        let mut history = history(store);
        history.load().await.unwrap();
        assert!(OrderHistory::<FakeOrderStore>::can_confirm(&history.orders()[0]));
        assert!(!OrderHistory::<FakeOrderStore>::can_confirm(&history.orders()[1]));

        history.confirm_received(OrderId::new(1)).await.unwrap();

        assert_eq!(history.orders()[0].status, OrderStatus::Delivered);
        assert_eq!(history.delivered_orders().count(), 1);
        assert_eq!(history.current_orders().count(), 1);
        assert_eq!(history.store.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_failure_leaves_status_untouched() {
        let store = FakeOrderStore::with_orders(vec![order(1, OrderStatus::Shipped)]);
        *store.confirm_error.lock().unwrap() = Some(ApiError::Rejected {
            status: 400,
            message: Some("Order is not in SHIPPED status".to_string()),
        });
        let mut history = history(store);
        history.load().await.unwrap();

        history.confirm_received(OrderId::new(1)).await.unwrap_err();

        assert_eq!(history.orders()[0].status, OrderStatus::Shipped);
        assert_eq!(history.last_error(), Some("Order is not in SHIPPED status"));
        assert_eq!(history.store.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_scope_drops_results() {
        let store = FakeOrderStore::with_orders(vec![order(1, OrderStatus::Pending)]);
        let mut history = history(store);
        history.scope().close();

        history.load().await.unwrap();
        assert!(history.orders().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_is_unauthorized() {
        let mut history = OrderHistory::new(FakeOrderStore::default(), SessionHandle::new());
        assert_eq!(history.load().await, Err(ApiError::Unauthorized));
        assert_eq!(history.last_error(), None);
    }
}
