//! Checkout Orchestrator.
//!
//! A linear wizard: cart review, shipping, payment, confirmation. Each step
//! must validate before the flow moves on; going back is always allowed
//! except from the confirmation, which is terminal. Leaving the payment step
//! places the order with a single `create-order` call carrying only the
//! shipping details and payment method. On success the cart is cleared.
//!
//! Every flow starts from a fresh [`CheckoutDraft`]; nothing carries over
//! between flows except an explicit profile pre-fill.

mod pricing;

pub use pricing::{OrderTotals, PricingPolicy};

use std::sync::Arc;

use bookshop_core::{OrderId, PaymentMethod};
use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{CartStore, OrderRequest, OrderStore, ProfileStore, ShippingInfo};
use crate::cart::CartManager;
use crate::config::StorefrontConfig;
use crate::error::{ApiError, ValidationErrors, add_breadcrumb, report};
use crate::scope::Scope;
use crate::session::SessionHandle;
use crate::validation;

const EMPTY_CART: &str = "Your cart is empty";
const SHIPPING_INCOMPLETE: &str = "Please fill in all required shipping information fields";
const PLACE_ORDER_FAILED: &str = "Failed to place your order. Please try again.";
const PREFILL_FAILED: &str = "Failed to load checkout data";

/// Liveness of one checkout flow. Closing it abandons the flow.
pub type FlowScope = Scope;

// =============================================================================
// Steps & draft
// =============================================================================

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckoutStep {
    CartReview = 0,
    ShippingInfo = 1,
    PaymentDetails = 2,
    Confirmation = 3,
}

impl CheckoutStep {
    pub const ALL: [Self; 4] = [
        Self::CartReview,
        Self::ShippingInfo,
        Self::PaymentDetails,
        Self::Confirmation,
    ];

    /// Zero-based position in the wizard.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::CartReview => "Review Cart",
            Self::ShippingInfo => "Shipping Information",
            Self::PaymentDetails => "Payment Details",
            Self::Confirmation => "Confirmation",
        }
    }

    const fn next(self) -> Self {
        match self {
            Self::CartReview => Self::ShippingInfo,
            Self::ShippingInfo => Self::PaymentDetails,
            Self::PaymentDetails | Self::Confirmation => Self::Confirmation,
        }
    }

    const fn previous(self) -> Self {
        match self {
            Self::CartReview | Self::ShippingInfo => Self::CartReview,
            Self::PaymentDetails => Self::ShippingInfo,
            Self::Confirmation => Self::PaymentDetails,
        }
    }
}

/// Card fields as typed. Implements `Debug` manually to redact them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits: String = self.number.chars().filter(char::is_ascii_digit).collect();
        let last4 = digits.get(digits.len().saturating_sub(4)..).unwrap_or_default();
        f.debug_struct("CardDetails")
            .field("number", &format!("**** {last4}"))
            .field("expiry", &self.expiry)
            .field("cvv", &"[REDACTED]")
            .finish()
    }
}

/// How the customer pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDetails {
    Credit(CardDetails),
    Paypal,
}

impl Default for PaymentDetails {
    fn default() -> Self {
        Self::Credit(CardDetails::default())
    }
}

impl PaymentDetails {
    /// The wire value sent with the order.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::Credit(_) => PaymentMethod::Credit,
            Self::Paypal => PaymentMethod::Paypal,
        }
    }
}

/// What the customer has entered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub shipping: ShippingInfo,
    pub payment: PaymentDetails,
}

/// Why a checkout action did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckoutError {
    /// Local field validation failed; nothing was sent.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The order store refused or could not be reached.
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// The flow is on the confirmation step.
    #[error("Checkout is complete")]
    Terminal,

    /// The order can only be placed from the payment step.
    #[error("Cannot place the order from the {} step", .0.title())]
    OutOfOrder(CheckoutStep),

    /// The flow was torn down while the request was outstanding.
    #[error("Checkout was abandoned")]
    Abandoned,
}

/// Policy knobs for a flow.
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    pub pricing: PricingPolicy,
    /// Gate the payment step on the Luhn checksum.
    pub enforce_card_checksum: bool,
}

impl From<&StorefrontConfig> for CheckoutOptions {
    fn from(config: &StorefrontConfig) -> Self {
        Self {
            pricing: config.pricing.clone(),
            enforce_card_checksum: config.enforce_card_checksum,
        }
    }
}

// =============================================================================
// CheckoutFlow
// =============================================================================

/// One pass through the checkout wizard.
pub struct CheckoutFlow<C, O> {
    cart: Arc<CartManager<C>>,
    orders: O,
    session: SessionHandle,
    options: CheckoutOptions,
    draft: CheckoutDraft,
    step: CheckoutStep,
    order_id: Option<OrderId>,
    last_error: Option<String>,
    scope: FlowScope,
}

impl<C, O> CheckoutFlow<C, O>
where
    C: CartStore,
    O: OrderStore + ProfileStore,
{
    /// Begin a new flow at [`CheckoutStep::CartReview`] with an empty draft.
    #[must_use]
    pub fn start(
        cart: Arc<CartManager<C>>,
        orders: O,
        session: SessionHandle,
        options: CheckoutOptions,
    ) -> Self {
        add_breadcrumb("checkout", "Checkout started", None);
        Self {
            cart,
            orders,
            session,
            options,
            draft: CheckoutDraft::default(),
            step: CheckoutStep::CartReview,
            order_id: None,
            last_error: None,
            scope: FlowScope::new(),
        }
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub const fn draft(&self) -> &CheckoutDraft {
        &self.draft
    }

    /// Edit the shipping form.
    pub const fn shipping_mut(&mut self) -> &mut ShippingInfo {
        &mut self.draft.shipping
    }

    /// The placed order, once confirmed.
    #[must_use]
    pub const fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// The message to show for the last failed action.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// A handle that abandons this flow when closed.
    #[must_use]
    pub fn scope(&self) -> FlowScope {
        self.scope.clone()
    }

    /// Tear the flow down; an outstanding order response will be ignored.
    pub fn abandon(&self) {
        self.scope.close();
    }

    /// Display totals for the current cart.
    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        let cart = self.cart.snapshot();
        self.options.pricing.totals(cart.subtotal(), !cart.is_empty())
    }

    /// Choose the payment method by its wire name (`credit` or `paypal`).
    ///
    /// # Errors
    ///
    /// Returns a validation error for any other value.
    pub fn set_payment_method(&mut self, method: &str) -> Result<(), CheckoutError> {
        let method = method.parse::<PaymentMethod>().map_err(|message| {
            let mut errors = ValidationErrors::new();
            errors.add("paymentMethod", message);
            CheckoutError::Validation(errors)
        })?;
        self.draft.payment = match (method, &self.draft.payment) {
            (PaymentMethod::Credit, PaymentDetails::Credit(card)) => {
                PaymentDetails::Credit(card.clone())
            }
            (PaymentMethod::Credit, PaymentDetails::Paypal) => PaymentDetails::default(),
            (PaymentMethod::Paypal, _) => PaymentDetails::Paypal,
        };
        Ok(())
    }

    /// Enter card details (switches the method to credit).
    pub fn set_card(&mut self, card: CardDetails) {
        self.draft.payment = PaymentDetails::Credit(card);
    }

    /// Fill blank name, email, address and phone fields from the stored
    /// profile. City, state and ZIP are never pre-filled.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; the draft is left as it was.
    #[instrument(skip(self))]
    pub async fn prefill_from_profile(&mut self) -> Result<(), ApiError> {
        let session = self.session.current().ok_or(ApiError::Unauthorized)?;
        let result = self.orders.get_profile(&session).await;

        if !self.scope.is_live() {
            return result.map(drop);
        }

        let profile = match result {
            Ok(profile) => profile,
            Err(err) => {
                if !err.is_unauthorized() {
                    report("checkout.prefill", &err);
                    self.last_error = Some(PREFILL_FAILED.to_string());
                }
                return Err(err);
            }
        };

        let shipping = &mut self.draft.shipping;
        for (field, value) in [
            (&mut shipping.first_name, profile.first_name),
            (&mut shipping.last_name, profile.last_name),
            (&mut shipping.email, profile.email),
            (&mut shipping.address, profile.address),
            (&mut shipping.phone, profile.phone_number),
        ] {
            if field.trim().is_empty()
                && let Some(value) = value
            {
                *field = value;
            }
        }
        Ok(())
    }

    /// Check whether `step` may be left forwards.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate_step(&self, step: CheckoutStep) -> Result<(), ValidationErrors> {
        self.validate_step_at(step, Local::now().date_naive())
    }

    fn validate_step_at(
        &self,
        step: CheckoutStep,
        today: NaiveDate,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match step {
            CheckoutStep::CartReview => {
                if self.cart.snapshot().is_empty() {
                    errors.add("cart", EMPTY_CART);
                }
            }
            CheckoutStep::ShippingInfo => {
                for (field, value) in self.draft.shipping.fields() {
                    errors.check(field, validation::required(value, field_label(field)));
                }
            }
            CheckoutStep::PaymentDetails => match &self.draft.payment {
                PaymentDetails::Paypal => {}
                PaymentDetails::Credit(card) => {
                    match validation::card_number(&card.number) {
                        Ok(digits) => {
                            if self.options.enforce_card_checksum
                                && !validation::luhn_checksum_valid(&digits)
                            {
                                errors.add("cardNumber", "Invalid credit card number");
                            }
                        }
                        Err(message) => errors.add("cardNumber", message),
                    }
                    errors.check("expiry", validation::expiry(&card.expiry, today));
                    errors.check("cvv", validation::cvv(&card.cvv));
                }
            },
            CheckoutStep::Confirmation => {}
        }
        errors.into_result()
    }

    /// Move forward one step. From the payment step this places the order.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the current step is incomplete, `Terminal` on
    /// the confirmation step, or the order placement failure.
    pub async fn advance(&mut self) -> Result<CheckoutStep, CheckoutError> {
        match self.step {
            CheckoutStep::Confirmation => Err(CheckoutError::Terminal),
            CheckoutStep::PaymentDetails => {
                self.place_order().await?;
                Ok(self.step)
            }
            step => {
                if let Err(errors) = self.validate_step(step) {
                    self.last_error = Some(step_message(step, &errors));
                    return Err(CheckoutError::Validation(errors));
                }
                self.last_error = None;
                self.step = step.next();
                add_breadcrumb("checkout", self.step.title(), None);
                Ok(self.step)
            }
        }
    }

    /// Move back one step. A no-op on the first step.
    ///
    /// # Errors
    ///
    /// Returns `Terminal` on the confirmation step.
    pub fn back(&mut self) -> Result<CheckoutStep, CheckoutError> {
        if self.step == CheckoutStep::Confirmation {
            return Err(CheckoutError::Terminal);
        }
        self.last_error = None;
        self.step = self.step.previous();
        Ok(self.step)
    }

    /// Place the order and move to the confirmation step.
    ///
    /// Only shipping details and the payment method are sent; the backend
    /// prices the order from the session's cart. On success the local cart
    /// is cleared; a failure to clear is logged and does not undo the order.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the payment step is incomplete, `Remote` if
    /// the order store refused, or `Abandoned` if the flow was torn down
    /// before the answer arrived. The flow stays on the payment step.
    #[instrument(skip(self), fields(payment_method = %self.draft.payment.method()))]
    pub async fn place_order(&mut self) -> Result<OrderId, CheckoutError> {
        match self.step {
            CheckoutStep::PaymentDetails => {}
            CheckoutStep::Confirmation => return Err(CheckoutError::Terminal),
            step => return Err(CheckoutError::OutOfOrder(step)),
        }
        if let Err(errors) = self.validate_step(CheckoutStep::PaymentDetails) {
            self.last_error = Some(step_message(CheckoutStep::PaymentDetails, &errors));
            return Err(CheckoutError::Validation(errors));
        }
        let Some(session) = self.session.current() else {
            return Err(CheckoutError::Remote(ApiError::Unauthorized));
        };

        self.last_error = None;
        add_breadcrumb("checkout", "Placing order", None);
        let request = OrderRequest {
            shipping_info: trimmed(&self.draft.shipping),
            payment_method: self.draft.payment.method(),
        };
        let result = self.orders.create_order(&session, &request).await;

        if !self.scope.is_live() {
            warn!("Order response arrived after checkout was abandoned");
            return Err(CheckoutError::Abandoned);
        }

        let order = match result {
            Ok(order) => order,
            Err(err) => {
                if !err.is_unauthorized() {
                    report("checkout.place_order", &err);
                    self.last_error = Some(err.user_message(PLACE_ORDER_FAILED));
                }
                return Err(CheckoutError::Remote(err));
            }
        };

        info!(order_id = %order.id, total = %order.total_amount, "Order placed");
        self.order_id = Some(order.id);
        self.step = CheckoutStep::Confirmation;
        // Card and address are not kept past the order; the method stays for display.
        self.draft = CheckoutDraft {
            shipping: ShippingInfo::default(),
            payment: match self.draft.payment.method() {
                PaymentMethod::Credit => PaymentDetails::Credit(CardDetails::default()),
                PaymentMethod::Paypal => PaymentDetails::Paypal,
            },
        };

        if let Err(err) = self.cart.clear().await {
            warn!(order_id = %order.id, error = %err, "Order placed but cart could not be cleared");
        }
        Ok(order.id)
    }
}

fn field_label(field: &str) -> &'static str {
    match field {
        "firstName" => "First name",
        "lastName" => "Last name",
        "address" => "Address",
        "city" => "City",
        "state" => "State",
        "zipCode" => "ZIP code",
        "email" => "Email",
        "phone" => "Phone number",
        _ => "Field",
    }
}

fn step_message(step: CheckoutStep, errors: &ValidationErrors) -> String {
    match step {
        CheckoutStep::CartReview => EMPTY_CART.to_string(),
        CheckoutStep::ShippingInfo => SHIPPING_INCOMPLETE.to_string(),
        _ => errors
            .iter()
            .next()
            .map_or_else(String::new, |(_, message)| message.to_string()),
    }
}

fn trimmed(shipping: &ShippingInfo) -> ShippingInfo {
    ShippingInfo {
        first_name: shipping.first_name.trim().to_string(),
        last_name: shipping.last_name.trim().to_string(),
        address: shipping.address.trim().to_string(),
        city: shipping.city.trim().to_string(),
        state: shipping.state.trim().to_string(),
        zip_code: shipping.zip_code.trim().to_string(),
        email: shipping.email.trim().to_string(),
        phone: shipping.phone.trim().to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use bookshop_core::{OrderStatus, Price, UserId};
    use chrono::Datelike;
    use tokio::sync::oneshot;

    use super::*;
    use crate::api::{OrderFilter, OrderResponse, Page, Pagination, ProfileUpdate, UserProfile};
    use crate::cart::SyncPolicy;
    use crate::cart::tests::{FakeCartStore, item, manager};
    use crate::session::Session;
    use crate::session::tests::test_session;

    #[derive(Default)]
    struct FakeOrderStore {
        requests: Mutex<Vec<OrderRequest>>,
        fail_with: Mutex<Option<ApiError>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        profile: Option<UserProfile>,
    }

    impl OrderStore for FakeOrderStore {
        async fn create_order(
            &self,
            _session: &Session,
            request: &OrderRequest,
        ) -> Result<OrderResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if let Some(err) = self.fail_with.lock().unwrap().take() {
                return Err(err);
            }
            Ok(OrderResponse {
                id: OrderId::new(501),
                user_id: Some(UserId::new(1)),
                order_date: None,
                total_amount: Price::from_cents(11_299),
                status: OrderStatus::Pending,
                items: Vec::new(),
                shipping_info: Some(request.shipping_info.clone()),
                payment_method: Some(request.payment_method.to_string()),
            })
        }

        async fn list_orders(
            &self,
            _session: &Session,
            _filter: &OrderFilter,
            _pagination: Pagination,
        ) -> Result<Page<OrderResponse>, ApiError> {
            unreachable!("not used by checkout")
        }

        async fn get_order(
            &self,
            _session: &Session,
            _id: OrderId,
        ) -> Result<OrderResponse, ApiError> {
            unreachable!("not used by checkout")
        }

        async fn confirm_received(
            &self,
            _session: &Session,
            _id: OrderId,
        ) -> Result<OrderResponse, ApiError> {
            unreachable!("not used by checkout")
        }
    }

    impl ProfileStore for FakeOrderStore {
        async fn get_profile(&self, _session: &Session) -> Result<UserProfile, ApiError> {
            self.profile.clone().ok_or(ApiError::Rejected {
                status: 404,
                message: None,
            })
        }

        async fn update_profile(
            &self,
            _session: &Session,
            _update: &ProfileUpdate,
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    /// A card expiry two years from now.
    fn future_expiry() -> String {
        let today = Local::now().date_naive();
        format!("{:02}/{:02}", today.month(), (today.year() + 2) % 100)
    }

    fn valid_card() -> CardDetails {
        CardDetails {
            number: "4242 4242 4242 4242".to_string(),
            expiry: future_expiry(),
            cvv: "123".to_string(),
        }
    }

    fn fill_shipping(shipping: &mut ShippingInfo) {
        *shipping = ShippingInfo {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            address: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "NY".to_string(),
            zip_code: "10001".to_string(),
            email: "ada@example.com".to_string(),
            phone: "5551234567".to_string(),
        };
    }

    async fn flow_with(
        items: Vec<crate::api::CartItemResponse>,
        orders: FakeOrderStore,
    ) -> CheckoutFlow<FakeCartStore, FakeOrderStore> {
        let session = SessionHandle::with_session(test_session(1));
        let cart = Arc::new(manager(
            FakeCartStore::with_items(items),
            session.clone(),
            SyncPolicy::default(),
        ));
        cart.fetch().await.unwrap();
        CheckoutFlow::start(cart, orders, session, CheckoutOptions::default())
    }

    async fn at_payment(flow: &mut CheckoutFlow<FakeCartStore, FakeOrderStore>) {
        flow.advance().await.unwrap();
        fill_shipping(flow.shipping_mut());
        flow.advance().await.unwrap();
        assert_eq!(flow.step(), CheckoutStep::PaymentDetails);
    }

    #[tokio::test]
    async fn test_happy_path_places_order_and_clears_cart() {
        let mut flow = flow_with(vec![item(1, 10_000, 1)], FakeOrderStore::default()).await;
        assert_eq!(flow.totals().total.display(), "$112.99");

        at_payment(&mut flow).await;
        flow.set_card(valid_card());
        let step = flow.advance().await.unwrap();

        assert_eq!(step, CheckoutStep::Confirmation);
        assert_eq!(flow.order_id(), Some(OrderId::new(501)));
        assert!(flow.cart.snapshot().is_empty());
        assert_eq!(flow.cart.total_items(), 0);
        assert_eq!(flow.cart.store().calls().last().map(String::as_str), Some("clear"));

        let requests = flow.orders.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].payment_method, PaymentMethod::Credit);
        assert_eq!(requests[0].shipping_info.city, "London");
    }

    #[tokio::test]
    async fn test_placed_order_clears_entered_details() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        at_payment(&mut flow).await;
        flow.set_card(valid_card());
        flow.place_order().await.unwrap();

        assert_eq!(flow.draft().shipping, ShippingInfo::default());
        assert_eq!(
            flow.draft().payment,
            PaymentDetails::Credit(CardDetails::default())
        );
        let requests = flow.orders.requests.lock().unwrap();
        assert_eq!(requests[0].shipping_info.city, "London");
    }

    #[tokio::test]
    async fn test_empty_cart_blocks_first_step() {
        let mut flow = flow_with(Vec::new(), FakeOrderStore::default()).await;

        let err = flow.advance().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert_eq!(flow.step(), CheckoutStep::CartReview);
        assert_eq!(flow.last_error(), Some(EMPTY_CART));
        assert_eq!(flow.totals().shipping, Price::ZERO);
    }

    #[tokio::test]
    async fn test_blank_shipping_field_blocks_advance() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        flow.advance().await.unwrap();
        fill_shipping(flow.shipping_mut());
        flow.shipping_mut().city = "   ".to_string();

        let CheckoutError::Validation(errors) = flow.advance().await.unwrap_err() else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.get("city"), Some("City is required"));
        assert_eq!(flow.step(), CheckoutStep::ShippingInfo);
        assert_eq!(flow.last_error(), Some(SHIPPING_INCOMPLETE));
    }

    #[tokio::test]
    async fn test_invalid_card_never_reaches_the_order_store() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        at_payment(&mut flow).await;
        flow.set_card(CardDetails {
            number: "4242".to_string(),
            expiry: "01/20".to_string(),
            cvv: "1".to_string(),
        });

        let CheckoutError::Validation(errors) = flow.advance().await.unwrap_err() else {
            panic!("expected a validation error");
        };
        assert!(errors.get("cardNumber").is_some());
        assert_eq!(errors.get("expiry"), Some("Card has expired"));
        assert!(errors.get("cvv").is_some());
        assert_eq!(flow.step(), CheckoutStep::PaymentDetails);
        assert!(flow.orders.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_luhn_is_only_enforced_when_configured() {
        let bad_checksum = CardDetails {
            number: "4242 4242 4242 4241".to_string(),
            ..valid_card()
        };

        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        flow.set_card(bad_checksum.clone());
        assert!(flow.validate_step(CheckoutStep::PaymentDetails).is_ok());

        flow.options.enforce_card_checksum = true;
        let errors = flow.validate_step(CheckoutStep::PaymentDetails).unwrap_err();
        assert_eq!(errors.get("cardNumber"), Some("Invalid credit card number"));
    }

    #[tokio::test]
    async fn test_paypal_needs_no_card() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        at_payment(&mut flow).await;
        flow.set_payment_method("paypal").unwrap();

        flow.place_order().await.unwrap();
        assert_eq!(
            flow.orders.requests.lock().unwrap()[0].payment_method,
            PaymentMethod::Paypal
        );
    }

    #[tokio::test]
    async fn test_unknown_payment_method_is_rejected() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        assert!(matches!(
            flow.set_payment_method("bitcoin"),
            Err(CheckoutError::Validation(_))
        ));
        assert!(flow.set_payment_method("").is_err());
        assert_eq!(flow.draft().payment.method(), PaymentMethod::Credit);
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_flow_on_payment_with_server_message() {
        let orders = FakeOrderStore::default();
        *orders.fail_with.lock().unwrap() = Some(ApiError::Rejected {
            status: 400,
            message: Some("Insufficient stock for Dune".to_string()),
        });
        let mut flow = flow_with(vec![item(1, 1000, 1)], orders).await;
        at_payment(&mut flow).await;
        flow.set_card(valid_card());

        let err = flow.advance().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Remote(ApiError::Rejected { .. })));
        assert_eq!(flow.step(), CheckoutStep::PaymentDetails);
        assert_eq!(flow.last_error(), Some("Insufficient stock for Dune"));
        assert_eq!(flow.order_id(), None);
        assert_eq!(flow.cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_generic_text() {
        let orders = FakeOrderStore::default();
        *orders.fail_with.lock().unwrap() = Some(ApiError::Rejected {
            status: 500,
            message: None,
        });
        let mut flow = flow_with(vec![item(1, 1000, 1)], orders).await;
        at_payment(&mut flow).await;
        flow.set_payment_method("paypal").unwrap();

        flow.place_order().await.unwrap_err();
        assert_eq!(flow.last_error(), Some(PLACE_ORDER_FAILED));
    }

    #[tokio::test]
    async fn test_order_response_after_abandon_is_not_applied() {
        let (release, gate) = oneshot::channel();
        let orders = FakeOrderStore {
            gate: Mutex::new(Some(gate)),
            ..FakeOrderStore::default()
        };
        let mut flow = flow_with(vec![item(1, 1000, 1)], orders).await;
        at_payment(&mut flow).await;
        flow.set_payment_method("paypal").unwrap();
        let scope = flow.scope();

        let (result, ()) = tokio::join!(flow.place_order(), async {
            scope.close();
            release.send(()).unwrap();
        });

        assert_eq!(result.unwrap_err(), CheckoutError::Abandoned);
        assert_eq!(flow.step(), CheckoutStep::PaymentDetails);
        assert_eq!(flow.order_id(), None);
        assert_eq!(flow.cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_navigation_rules() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        assert_eq!(flow.back().unwrap(), CheckoutStep::CartReview);
        assert!(matches!(
            flow.place_order().await,
            Err(CheckoutError::OutOfOrder(CheckoutStep::CartReview))
        ));

        at_payment(&mut flow).await;
        assert_eq!(flow.back().unwrap(), CheckoutStep::ShippingInfo);
        assert_eq!(flow.back().unwrap(), CheckoutStep::CartReview);

        at_payment(&mut flow).await;
        flow.set_payment_method("paypal").unwrap();
        flow.advance().await.unwrap();
        assert_eq!(flow.back(), Err(CheckoutError::Terminal));
        assert_eq!(flow.advance().await, Err(CheckoutError::Terminal));
        assert_eq!(flow.step(), CheckoutStep::Confirmation);
    }

    #[tokio::test]
    async fn test_new_flow_starts_fresh() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        at_payment(&mut flow).await;
        flow.set_card(valid_card());
        flow.advance().await.unwrap();

        let cart = Arc::clone(&flow.cart);
        let session = flow.session.clone();
        let next = CheckoutFlow::start(
            cart,
            FakeOrderStore::default(),
            session,
            CheckoutOptions::default(),
        );

        assert_eq!(next.step(), CheckoutStep::CartReview);
        assert_eq!(next.draft(), &CheckoutDraft::default());
        assert_eq!(next.order_id(), None);
    }

    #[tokio::test]
    async fn test_prefill_fills_only_blank_profile_fields() {
        let orders = FakeOrderStore {
            profile: Some(UserProfile {
                id: UserId::new(1),
                username: "ada".to_string(),
                email: Some("ada@example.com".to_string()),
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                address: Some("12 Analytical Way".to_string()),
                phone_number: None,
                roles: Vec::new(),
            }),
            ..FakeOrderStore::default()
        };
        let mut flow = flow_with(vec![item(1, 1000, 1)], orders).await;
        flow.shipping_mut().first_name = "Augusta".to_string();

        flow.prefill_from_profile().await.unwrap();

        let shipping = &flow.draft().shipping;
        assert_eq!(shipping.first_name, "Augusta");
        assert_eq!(shipping.last_name, "Lovelace");
        assert_eq!(shipping.email, "ada@example.com");
        assert_eq!(shipping.address, "12 Analytical Way");
        assert_eq!(shipping.phone, "");
        assert_eq!(shipping.city, "");
    }

    #[tokio::test]
    async fn test_prefill_failure_records_message() {
        let mut flow = flow_with(vec![item(1, 1000, 1)], FakeOrderStore::default()).await;
        flow.prefill_from_profile().await.unwrap_err();
        assert_eq!(flow.last_error(), Some(PREFILL_FAILED));
        assert_eq!(flow.draft(), &CheckoutDraft::default());
    }

    #[test]
    fn test_card_debug_is_redacted() {
        let debug = format!("{:?}", valid_card());
        assert!(debug.contains("**** 4242"));
        assert!(!debug.contains("4242 4242"));
        assert!(!debug.contains("123"));
    }

    #[test]
    fn test_step_indices() {
        let indices: Vec<usize> = CheckoutStep::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
