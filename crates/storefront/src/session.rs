//! Session context shared by every remote call.
//!
//! The session (bearer token + identity) is held in a [`SessionHandle`], an
//! explicitly passed, cheaply clonable cell backed by a `tokio::sync::watch`
//! channel. Sign-in and sign-out are observable as [`SessionEvent`]s so the
//! cart manager can rehydrate or clear itself.

use bookshop_core::{Email, Role, UserId};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;

/// The authenticated user behind a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: Option<Email>,
    pub roles: Vec<Role>,
}

impl Identity {
    /// Whether the user has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

/// An authenticated session.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct Session {
    token: SecretString,
    identity: Identity,
}

impl Session {
    /// Create a session from a bearer token and the identity it belongs to.
    #[must_use]
    pub fn new(token: impl Into<SecretString>, identity: Identity) -> Self {
        Self {
            token: token.into(),
            identity,
        }
    }

    /// The bearer token.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    /// The user this session belongs to.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether both sessions carry the same token.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
    }

    /// Value for the `Authorization` header.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("identity", &self.identity)
            .finish()
    }
}

/// A session state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

impl SessionEvent {
    fn from_state(state: Option<&Session>) -> Self {
        state.map_or(Self::SignedOut, |session| {
            Self::SignedIn(session.identity.clone())
        })
    }
}

/// Shared, observable session cell.
#[derive(Clone)]
pub struct SessionHandle {
    tx: watch::Sender<Option<Session>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Create a handle with no active session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Create a handle that starts with an active session.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let (tx, _rx) = watch::channel(Some(session));
        Self { tx }
    }

    /// Install a new session and notify subscribers.
    pub fn sign_in(&self, session: Session) {
        tracing::info!(user_id = %session.identity.id, "Session started");
        crate::error::set_sentry_user(
            &session.identity.id,
            session.identity.email.as_ref().map(Email::as_str),
        );
        self.tx.send_replace(Some(session));
    }

    /// Drop the current session and notify subscribers.
    ///
    /// Signing out when already signed out is a no-op and emits no event.
    pub fn sign_out(&self) {
        let changed = self.tx.send_if_modified(|state| state.take().is_some());
        if changed {
            tracing::info!("Session ended");
            crate::error::clear_sentry_user();
        }
    }

    /// Drop the session because the server rejected `rejected`'s token.
    ///
    /// A newer session installed since the rejected request was issued is
    /// left untouched.
    pub fn expire(&self, rejected: &Session) {
        let changed = self.tx.send_if_modified(|state| {
            let same = state.as_ref().is_some_and(|current| current.is_same(rejected));
            if same {
                *state = None;
            }
            same
        });
        if changed {
            tracing::warn!(
                user_id = %rejected.identity.id,
                "Session rejected by server, signing out"
            );
            crate::error::clear_sentry_user();
        }
    }

    /// The current session, if any.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Whether the active session belongs to an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.tx
            .borrow()
            .as_ref()
            .is_some_and(|session| session.identity.is_admin())
    }

    /// Subscribe to session transitions.
    #[must_use]
    pub fn subscribe(&self) -> SessionEvents {
        SessionEvents {
            rx: self.tx.subscribe(),
        }
    }
}

/// Stream of [`SessionEvent`]s.
pub struct SessionEvents {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionEvents {
    /// The event describing the current state, without waiting.
    #[must_use]
    pub fn current(&mut self) -> SessionEvent {
        SessionEvent::from_state(self.rx.borrow_and_update().as_ref())
    }

    /// Wait for the next transition.
    ///
    /// Returns `None` once every [`SessionHandle`] has been dropped.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.rx.changed().await.ok()?;
        Some(SessionEvent::from_state(self.rx.borrow_and_update().as_ref()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_session(user_id: i64) -> Session {
        Session::new(
            format!("token-{user_id}"),
            Identity {
                id: UserId::new(user_id),
                username: format!("reader{user_id}"),
                email: Email::parse("reader@example.com").ok(),
                roles: vec![Role::User],
            },
        )
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = test_session(1);
        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("token-1"));
        assert_eq!(session.bearer(), "Bearer token-1");
    }

    #[test]
    fn test_sign_in_and_out() {
        let handle = SessionHandle::new();
        assert!(!handle.is_authenticated());

        handle.sign_in(test_session(7));
        assert!(handle.is_authenticated());
        assert!(!handle.is_admin());
        assert_eq!(handle.current().unwrap().identity().id, UserId::new(7));

        handle.sign_out();
        assert!(handle.current().is_none());
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let handle = SessionHandle::new();
        let mut events = handle.subscribe();
        assert_eq!(events.current(), SessionEvent::SignedOut);

        let session = test_session(3);
        handle.sign_in(session.clone());
        assert_eq!(
            events.next().await,
            Some(SessionEvent::SignedIn(session.identity().clone()))
        );

        handle.sign_out();
        assert_eq!(events.next().await, Some(SessionEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_redundant_sign_out_emits_nothing() {
        let handle = SessionHandle::new();
        let mut events = handle.subscribe();
        handle.sign_out();

        handle.sign_in(test_session(1));
        // The first observed transition is the sign-in, not a phantom sign-out.
        assert!(matches!(events.next().await, Some(SessionEvent::SignedIn(_))));
    }

    #[test]
    fn test_expire_only_clears_the_rejected_session() {
        let handle = SessionHandle::new();
        let stale = test_session(1);
        handle.sign_in(test_session(2));

        handle.expire(&stale);
        assert_eq!(handle.current().unwrap().identity().id, UserId::new(2));

        handle.expire(&test_session(2));
        assert!(!handle.is_authenticated());
    }

    #[test]
    fn test_admin_role() {
        let mut session = test_session(2);
        session.identity.roles.push(Role::Admin);
        let handle = SessionHandle::with_session(session);
        assert!(handle.is_admin());
    }
}
