//! Checkout wizard and order history end to end against the mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Datelike, Local};

use bookshop_core::{OrderStatus, Price};
use bookshop_integration_tests::{
    ALICE_ID, ALICE_PASSWORD, ALICE_USERNAME, DUNE, EMMA, MockBackend,
};
use bookshop_storefront::api::{OrderFilter, Pagination};
use bookshop_storefront::checkout::{CardDetails, CheckoutOptions};
use bookshop_storefront::{
    ApiClient, ApiError, CartManager, CheckoutError, CheckoutFlow, CheckoutStep, OrderHistory,
    SyncPolicy,
};

struct Shop {
    backend: MockBackend,
    client: ApiClient,
    cart: Arc<CartManager<ApiClient>>,
}

impl Shop {
    async fn open() -> Self {
        let backend = MockBackend::start().await;
        let client = backend.client();
        client.login(ALICE_USERNAME, ALICE_PASSWORD).await.unwrap();
        let cart = Arc::new(CartManager::new(
            client.clone(),
            client.session().clone(),
            SyncPolicy::default(),
        ));
        Self {
            backend,
            client,
            cart,
        }
    }

    fn checkout(&self) -> CheckoutFlow<ApiClient, ApiClient> {
        CheckoutFlow::start(
            Arc::clone(&self.cart),
            self.client.clone(),
            self.client.session().clone(),
            CheckoutOptions::default(),
        )
    }

    fn history(&self) -> OrderHistory<ApiClient> {
        OrderHistory::new(self.client.clone(), self.client.session().clone())
    }

    /// Place an order for `quantity` copies of Emma by PayPal.
    async fn place_order(&self, quantity: u32) {
        self.cart.add_line(EMMA, quantity).await.unwrap();
        let mut flow = self.checkout();
        flow.prefill_from_profile().await.unwrap();
        flow.advance().await.unwrap();
        fill_remaining(&mut flow);
        flow.advance().await.unwrap();
        flow.set_payment_method("paypal").unwrap();
        flow.advance().await.unwrap();
    }
}

fn fill_remaining(flow: &mut CheckoutFlow<ApiClient, ApiClient>) {
    let shipping = flow.shipping_mut();
    shipping.city = "Oxford".to_string();
    shipping.state = "OX".to_string();
    shipping.zip_code = "12345".to_string();
}

fn future_expiry() -> String {
    format!("12/{:02}", (Local::now().year() + 2) % 100)
}

#[tokio::test]
async fn test_checkout_end_to_end() {
    let shop = Shop::open().await;
    shop.cart.add_line(DUNE, 2).await.unwrap();
    shop.cart.add_line(EMMA, 1).await.unwrap();

    let mut flow = shop.checkout();
    assert_eq!(flow.step(), CheckoutStep::CartReview);
    let totals = flow.totals();
    // 2 × 10.99 + 8.00 = 29.98; tax 2.0986; shipping 5.99
    assert_eq!(totals.subtotal, Price::from_cents(2998));
    assert_eq!(totals.total.display(), "$38.07");

    flow.prefill_from_profile().await.unwrap();
    assert_eq!(flow.draft().shipping.first_name, "Alice");
    assert_eq!(flow.draft().shipping.city, "");

    assert_eq!(flow.advance().await.unwrap(), CheckoutStep::ShippingInfo);
    assert!(matches!(
        flow.advance().await,
        Err(CheckoutError::Validation(_))
    ));
    fill_remaining(&mut flow);
    assert_eq!(flow.advance().await.unwrap(), CheckoutStep::PaymentDetails);

    flow.set_card(CardDetails {
        number: "4242 4242 4242 4242".to_string(),
        expiry: future_expiry(),
        cvv: "123".to_string(),
    });
    assert_eq!(flow.advance().await.unwrap(), CheckoutStep::Confirmation);

    let order_id = flow.order_id().unwrap();
    let orders = shop.backend.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order_id);
    assert_eq!(orders[0].payment_method.as_deref(), Some("credit"));
    assert_eq!(
        orders[0].shipping_info.as_ref().unwrap().address,
        "12 Rabbit Hole Lane"
    );
    assert_eq!(shop.backend.stock(DUNE), 3);

    assert!(shop.cart.snapshot().is_empty());
    assert!(shop.backend.cart_items(ALICE_ID).is_empty());
    assert_eq!(flow.back(), Err(CheckoutError::Terminal));
}

#[tokio::test]
async fn test_rejected_order_stays_on_payment() {
    let shop = Shop::open().await;
    shop.cart.add_line(EMMA, 1).await.unwrap();
    let mut flow = shop.checkout();
    flow.prefill_from_profile().await.unwrap();
    flow.advance().await.unwrap();
    fill_remaining(&mut flow);
    flow.advance().await.unwrap();
    flow.set_payment_method("paypal").unwrap();

    shop.backend
        .fail_next(400, r#"{"message": "Insufficient stock for book: Emma"}"#);
    let err = flow.advance().await.unwrap_err();

    assert!(matches!(err, CheckoutError::Remote(ApiError::Rejected { .. })));
    assert_eq!(flow.step(), CheckoutStep::PaymentDetails);
    assert_eq!(flow.last_error(), Some("Insufficient stock for book: Emma"));
    assert_eq!(shop.cart.total_items(), 1);
    assert!(shop.backend.orders().is_empty());

    // Resubmitting is the user's call.
    flow.place_order().await.unwrap();
    assert_eq!(flow.step(), CheckoutStep::Confirmation);
    assert_eq!(
        shop.backend.orders()[0].payment_method.as_deref(),
        Some("paypal")
    );
}

#[tokio::test]
async fn test_order_history_pages_and_filters() {
    let shop = Shop::open().await;
    for _ in 0..3 {
        shop.place_order(1).await;
    }

    let mut history = shop.history().with_pagination(Pagination { page: 0, size: 2 });
    history.load().await.unwrap();
    assert_eq!(history.orders().len(), 2);
    assert_eq!(history.total_elements(), 3);
    assert_eq!(history.total_pages(), 2);

    history.go_to_page(1).await.unwrap();
    assert_eq!(history.orders().len(), 1);

    history
        .apply_filter(OrderFilter {
            status: Some(OrderStatus::Delivered),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(history.pagination().page, 0);
    assert!(history.orders().is_empty());
    let last = shop.backend.requests().pop().unwrap();
    assert_eq!(last.query.as_deref(), Some("status=DELIVERED&page=0&size=2"));
}

#[tokio::test]
async fn test_bare_order_list_is_a_single_page() {
    let shop = Shop::open().await;
    shop.place_order(1).await;
    shop.place_order(2).await;
    shop.backend.set_bare_order_list(true);

    let mut history = shop.history();
    history.load().await.unwrap();
    assert_eq!(history.orders().len(), 2);
    assert_eq!(history.total_pages(), 1);
    assert_eq!(history.total_elements(), 2);
}

#[tokio::test]
async fn test_confirm_received_only_for_shipped_orders() {
    let shop = Shop::open().await;
    shop.place_order(1).await;
    let mut history = shop.history();
    history.load().await.unwrap();
    let order_id = history.orders()[0].id;
    assert!(!OrderHistory::<ApiClient>::can_confirm(&history.orders()[0]));

    let err = history.confirm_received(order_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
    assert_eq!(history.orders()[0].status, OrderStatus::Pending);
    assert_eq!(
        history.last_error(),
        Some("Order must be in SHIPPED status to confirm receipt")
    );

    shop.backend.ship_order(order_id);
    history.load().await.unwrap();
    assert!(OrderHistory::<ApiClient>::can_confirm(&history.orders()[0]));

    history.confirm_received(order_id).await.unwrap();
    assert_eq!(history.orders()[0].status, OrderStatus::Delivered);
    assert_eq!(history.last_error(), None);
    assert_eq!(shop.backend.orders()[0].status, OrderStatus::Delivered);
}
