//! Subcommand implementations.
//!
//! Every command prints plain text to stdout; logs and errors go to stderr.

pub mod admin;
pub mod auth;
pub mod books;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod profile;

use bookshop_core::Price;
use bookshop_storefront::config::ConfigError;
use bookshop_storefront::{
    ApiClient, ApiError, CheckoutError, Session, SessionHandle, StorefrontConfig,
    ValidationErrors,
};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The checkout wizard stopped.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Local input validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The command needs a session and none was supplied.
    #[error("Not signed in. Run `bookshop login` or pass --token.")]
    NotSignedIn,

    /// Invalid command-line input.
    #[error("{0}")]
    InvalidInput(String),
}

impl CommandError {
    /// The message printed before exiting.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message("The request failed. Please try again."),
            Self::Checkout(CheckoutError::Remote(err)) => {
                err.user_message("Failed to place your order. Please try again.")
            }
            other => other.to_string(),
        }
    }
}

/// Shared state for one CLI invocation.
pub struct Context {
    pub client: ApiClient,
    pub config: StorefrontConfig,
    token: Option<SecretString>,
}

impl Context {
    pub fn new(config: StorefrontConfig, token: Option<SecretString>) -> Self {
        let client = ApiClient::new(&config, SessionHandle::new());
        Self {
            client,
            config,
            token,
        }
    }

    /// The session handle shared by every manager built from this context.
    pub fn session(&self) -> &SessionHandle {
        self.client.session()
    }

    /// Resume the session from the supplied token.
    pub async fn sign_in(&self) -> Result<Session, CommandError> {
        if let Some(session) = self.session().current() {
            return Ok(session);
        }
        let token = self.token.clone().ok_or(CommandError::NotSignedIn)?;
        Ok(self.client.resume(token).await?)
    }
}

/// Right-align a price for table output.
pub fn money(price: Price) -> String {
    format!("{:>10}", price.display())
}
