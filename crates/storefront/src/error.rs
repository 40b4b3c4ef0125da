//! Unified error handling with Sentry integration.
//!
//! Remote failures are classified into the [`ApiError`] taxonomy and turned
//! into a user-visible message at the point of call. Local field validation
//! failures are collected in [`ValidationErrors`] and never reach the network.

use std::collections::BTreeMap;

use thiserror::Error;

/// Message shown when no response was received at all.
pub const NETWORK_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

/// Message shown when the session has expired or was rejected.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Errors returned by the remote stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, TLS error).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("Rejected with HTTP {status}: {}", message.as_deref().unwrap_or("(no message)"))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-supplied message, if the body carried one.
        message: Option<String>,
    },

    /// HTTP 401, or no session for an authenticated call.
    ///
    /// The shared session has already been cleared when this is returned.
    #[error("Unauthorized")]
    Unauthorized,

    /// A successful response whose body did not match the contract.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// The message to show the user for this failure.
    ///
    /// `fallback` is the operation-specific wording used when the server did
    /// not supply its own message.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Network(_) => NETWORK_MESSAGE.to_string(),
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Unauthorized => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Rejected { .. } | Self::Decode(_) => fallback.to_string(),
        }
    }

    /// Whether this failure is handled globally (session cleared).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether this is a server-side problem worth reporting.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status >= 500)
            || matches!(self, Self::Decode(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Rejected {
                status: status.as_u16(),
                message: None,
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", self.summary())]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    /// An empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for a field. The first error per field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    /// Record the outcome of a validator.
    pub fn check<T>(&mut self, field: &'static str, result: Result<T, String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The error for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Iterate `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn summary(&self) -> String {
        self.iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("book_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

/// Report a remote failure: server faults go to Sentry, the rest are logged.
pub fn report(operation: &str, err: &ApiError) {
    if err.is_server_fault() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            operation,
            error = %err,
            sentry_event_id = %event_id,
            "Remote call failed"
        );
    } else {
        tracing::warn!(operation, error = %err, "Remote call failed");
    }
}
