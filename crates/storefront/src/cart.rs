//! Cart State Manager.
//!
//! Keeps a local mirror of the server-held cart. Every mutation goes to the
//! [`CartStore`] and the local lines are replaced wholesale with the store's
//! authoritative answer; nothing is merged or computed locally except the
//! derived totals.
//!
//! # Concurrency
//!
//! Operations are neither queued nor coalesced. Two overlapping mutations
//! produce two round trips whose answers are applied in completion order
//! ([`SyncPolicy::LastResponseWins`]). With [`SyncPolicy::Sequenced`] each
//! request takes a sequence number and an answer older than the latest
//! applied one is discarded.
//!
//! Every completion checks that the manager has not been shut down and that
//! the session it was issued for is still current before touching state.
//! Local lines belong to one user; the first request made for a different
//! user empties them before it is sent.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bookshop_core::{BookId, Price, UserId};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::api::{CartItemResponse, CartResponse, CartStore};
use crate::error::{ApiError, add_breadcrumb, report};
use crate::scope::Scope;
use crate::session::{Session, SessionEvent, SessionEvents, SessionHandle};

/// Image shown for lines whose book has no image.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/400";

const LOAD_FAILED: &str = "Failed to load your cart. Please try again.";
const ADD_FAILED: &str = "Failed to add item to cart. Please try again.";
const UPDATE_FAILED: &str = "Failed to update quantity. Please try again.";
const REMOVE_FAILED: &str = "Failed to remove item from cart. Please try again.";
const CLEAR_FAILED: &str = "Failed to clear cart. Please try again.";

// =============================================================================
// State
// =============================================================================

/// One line of the cart. `quantity` is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: BookId,
    pub title: String,
    pub author: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub image_ref: String,
}

impl CartLine {
    /// `unit_price × quantity`, unrounded.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }
}

impl From<CartItemResponse> for CartLine {
    fn from(item: CartItemResponse) -> Self {
        Self {
            product_id: item.book_id,
            title: item.title,
            author: item.author,
            unit_price: item.price,
            quantity: item.quantity,
            image_ref: item
                .image_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        }
    }
}

/// Map the store's cart to local lines, dropping any non-positive line.
fn lines_from(cart: CartResponse) -> Vec<CartLine> {
    cart.items
        .into_iter()
        .filter(|item| item.quantity >= 1)
        .map(CartLine::from)
        .collect()
}

/// Snapshot of the cart as the UI sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    pub lines: Vec<CartLine>,
    /// True while at least one operation is outstanding.
    pub is_syncing: bool,
    pub last_error: Option<String>,
}

impl CartState {
    /// Σ quantity.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Σ (unit price × quantity), unrounded.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line for a book, if present.
    #[must_use]
    pub fn line(&self, product_id: BookId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }
}

/// How overlapping responses are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Apply every response in completion order.
    #[default]
    LastResponseWins,
    /// Discard responses older than the latest applied one.
    Sequenced,
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastResponseWins => write!(f, "last-response-wins"),
            Self::Sequenced => write!(f, "sequenced"),
        }
    }
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-response-wins" => Ok(Self::LastResponseWins),
            "sequenced" => Ok(Self::Sequenced),
            other => Err(format!(
                "expected 'last-response-wins' or 'sequenced', got '{other}'"
            )),
        }
    }
}

#[derive(Debug, Default)]
struct SyncTracker {
    /// The user the local lines belong to.
    owner: Option<UserId>,
    in_flight: usize,
    issued: u64,
    applied: u64,
}

enum Outcome {
    Replace(CartResponse),
    Empty,
}

// =============================================================================
// CartManager
// =============================================================================

/// Client-side mirror of the server-held cart.
pub struct CartManager<S> {
    store: S,
    session: SessionHandle,
    policy: SyncPolicy,
    state: watch::Sender<CartState>,
    tracker: Mutex<SyncTracker>,
    scope: Scope,
}

impl<S: CartStore> CartManager<S> {
    /// Create a manager with an empty cart. Call [`fetch`](Self::fetch) or
    /// [`follow_session`](Self::follow_session) to load it.
    #[must_use]
    pub fn new(store: S, session: SessionHandle, policy: SyncPolicy) -> Self {
        let (state, _rx) = watch::channel(CartState::default());
        Self {
            store,
            session,
            policy,
            state,
            tracker: Mutex::new(SyncTracker::default()),
            scope: Scope::new(),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Observe every state replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.state.borrow().total_items()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.state.borrow().subtotal()
    }

    /// The liveness scope guarding this manager's completions.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Stop applying responses. Outstanding requests still complete but
    /// their answers are dropped.
    pub fn shutdown(&self) {
        debug!("Cart manager shut down");
        self.scope.close();
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace local state with the server's cart.
    ///
    /// Without a session the local cart is emptied and no request is made.
    /// On failure the previous lines are kept.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; it has already been recorded in
    /// `last_error`.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<(), ApiError> {
        if !self.session.is_authenticated() {
            self.reset_local();
            return Ok(());
        }
        self.sync("cart.fetch", LOAD_FAILED, |session| async move {
            self.store.get_cart(&session).await.map(Outcome::Replace)
        })
        .await
    }

    /// Add `quantity` of a book. Quantity is not checked here; the store
    /// decides, and merges with an existing line.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; local lines are unchanged.
    #[instrument(skip(self), fields(book_id = %product_id))]
    pub async fn add_line(&self, product_id: BookId, quantity: u32) -> Result<(), ApiError> {
        let (book_id, qty) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Add item",
            Some(&[("book_id", book_id.as_str()), ("quantity", qty.as_str())]),
        );
        self.sync("cart.add", ADD_FAILED, |session| async move {
            self.store
                .add_item(&session, product_id, quantity)
                .await
                .map(Outcome::Replace)
        })
        .await
    }

    /// Set a line's quantity. Anything below 1 removes the line instead.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; local lines are unchanged.
    #[instrument(skip(self), fields(book_id = %product_id))]
    pub async fn update_quantity(&self, product_id: BookId, quantity: i64) -> Result<(), ApiError> {
        let Ok(quantity @ 1..) = u32::try_from(quantity.min(i64::from(u32::MAX))) else {
            return self.remove_line(product_id).await;
        };
        let (book_id, qty) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Update quantity",
            Some(&[("book_id", book_id.as_str()), ("quantity", qty.as_str())]),
        );
        self.sync("cart.update", UPDATE_FAILED, |session| async move {
            self.store
                .set_item_quantity(&session, product_id, quantity)
                .await
                .map(Outcome::Replace)
        })
        .await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; local lines are unchanged.
    #[instrument(skip(self), fields(book_id = %product_id))]
    pub async fn remove_line(&self, product_id: BookId) -> Result<(), ApiError> {
        add_breadcrumb(
            "cart",
            "Remove item",
            Some(&[("book_id", product_id.to_string().as_str())]),
        );
        self.sync("cart.remove", REMOVE_FAILED, |session| async move {
            self.store
                .remove_item(&session, product_id)
                .await
                .map(Outcome::Replace)
        })
        .await
    }

    /// Empty the cart. On success the local cart is empty whatever the
    /// store answered.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; local lines are unchanged.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), ApiError> {
        add_breadcrumb("cart", "Clear cart", None);
        self.sync("cart.clear", CLEAR_FAILED, |session| async move {
            self.store.clear_cart(&session).await.map(|()| Outcome::Empty)
        })
        .await
    }

    /// Follow session transitions until the manager is shut down or every
    /// session handle is gone: sign-in fetches, sign-out empties locally.
    ///
    /// The current state is acted on first.
    pub async fn follow_session(&self, mut events: SessionEvents) {
        let mut event = Some(events.current());
        while let Some(current) = event {
            if !self.scope.is_live() {
                break;
            }
            match current {
                SessionEvent::SignedIn(identity) => {
                    debug!(user_id = %identity.id, "Session started, loading cart");
                    // Failures are already recorded in `last_error`.
                    let _ = self.fetch().await;
                }
                SessionEvent::SignedOut => {
                    debug!("Session ended, clearing local cart");
                    self.reset_local();
                }
            }

            event = tokio::select! {
                next = events.next() => next,
                () = self.scope.closed() => None,
            };
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn tracker(&self) -> MutexGuard<'_, SyncTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Empty the local cart without a remote call.
    fn reset_local(&self) {
        self.tracker().owner = None;
        if !self.scope.is_live() {
            return;
        }
        self.state.send_if_modified(|state| {
            let changed = !state.lines.is_empty() || state.last_error.is_some();
            state.lines.clear();
            state.last_error = None;
            changed
        });
    }

    async fn sync<F, Fut>(
        &self,
        operation: &'static str,
        fallback: &'static str,
        call: F,
    ) -> Result<(), ApiError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<Outcome, ApiError>>,
    {
        let Some(session) = self.session.current() else {
            return Err(ApiError::Unauthorized);
        };

        self.claim(session.identity().id);
        let seq = self.begin();
        let result = call(session.clone()).await;
        self.finish(seq, &session, operation, fallback, result)
    }

    /// Make `user` the owner of the local lines, emptying them first if
    /// they belong to someone else.
    fn claim(&self, user: UserId) {
        let owner = self.tracker().owner;
        if let Some(previous) = owner.filter(|owner| *owner != user) {
            debug!(%previous, user_id = %user, "Cart owner changed, clearing local cart");
            self.reset_local();
        }
        self.tracker().owner = Some(user);
    }

    fn begin(&self) -> u64 {
        let mut tracker = self.tracker();
        tracker.in_flight += 1;
        tracker.issued += 1;
        let seq = tracker.issued;
        if self.scope.is_live() {
            self.state.send_modify(|state| {
                state.is_syncing = true;
                state.last_error = None;
            });
        }
        seq
    }

    fn finish(
        &self,
        seq: u64,
        session: &Session,
        operation: &'static str,
        fallback: &'static str,
        result: Result<Outcome, ApiError>,
    ) -> Result<(), ApiError> {
        if let Err(err) = &result
            && !err.is_unauthorized()
        {
            report(operation, err);
        }

        let mut tracker = self.tracker();
        tracker.in_flight = tracker.in_flight.saturating_sub(1);
        let in_flight = tracker.in_flight;

        if !self.scope.is_live() {
            debug!(operation, seq, "Dropping cart response after shutdown");
            return result.map(drop);
        }

        let same_session = self
            .session
            .current()
            .is_some_and(|current| current.is_same(session));
        let stale = self.policy == SyncPolicy::Sequenced && seq < tracker.applied;
        if result.is_ok() && same_session && !stale {
            tracker.applied = seq;
        }

        let mut lines = None;
        let mut error = None;
        let ret = match result {
            Ok(_) if !same_session => {
                debug!(operation, seq, "Dropping cart response for an ended session");
                Ok(())
            }
            Ok(_) if stale => {
                debug!(operation, seq, "Discarding out-of-order cart response");
                Ok(())
            }
            Ok(Outcome::Replace(cart)) => {
                lines = Some(lines_from(cart));
                Ok(())
            }
            Ok(Outcome::Empty) => {
                lines = Some(Vec::new());
                Ok(())
            }
            Err(err) => {
                if same_session && !stale && !err.is_unauthorized() {
                    error = Some(err.user_message(fallback));
                }
                Err(err)
            }
        };

        self.state.send_modify(|state| {
            state.is_syncing = in_flight > 0;
            if let Some(lines) = lines {
                state.lines = lines;
                state.last_error = None;
                debug!(
                    operation,
                    lines = state.lines.len(),
                    total_items = state.total_items(),
                    "Cart state replaced"
                );
            }
            if let Some(message) = error {
                state.last_error = Some(message);
            }
        });
        drop(tracker);

        ret
    }
}
