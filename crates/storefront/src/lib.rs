//! Bookshop storefront client library.
//!
//! Cart, checkout and order-history logic on top of the Bookshop REST
//! backend. The backend owns every cart and order; this crate keeps a local
//! mirror that is only ever replaced by the server's answer.
//!
//! - [`api::ApiClient`] talks to the remote stores
//! - [`cart::CartManager`] mirrors the server cart
//! - [`checkout::CheckoutFlow`] drives the checkout wizard
//! - [`orders::OrderHistory`] lists orders and confirms receipt

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod orders;
pub mod scope;
pub mod session;
pub mod validation;

pub use api::ApiClient;
pub use cart::{CartLine, CartManager, CartState, SyncPolicy};
pub use checkout::{CheckoutError, CheckoutFlow, CheckoutOptions, CheckoutStep};
pub use config::StorefrontConfig;
pub use error::{ApiError, ValidationErrors};
pub use orders::OrderHistory;
pub use session::{Identity, Session, SessionHandle};
