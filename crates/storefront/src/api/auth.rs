//! Auth and profile store.
//!
//! Sign-in installs the new session into the client's [`SessionHandle`],
//! which is what the cart manager follows for rehydration.
//!
//! [`SessionHandle`]: crate::session::SessionHandle

use std::future::Future;

use bookshop_core::{Email, UserId};
use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use super::types::{
    JwtResponse, LoginRequest, ProfileUpdate, RegisterRequest, RoleEntry, UserProfile,
};
use super::ApiClient;
use crate::error::{ApiError, add_breadcrumb};
use crate::session::{Identity, Session};

/// Remote profile operations for the signed-in user.
pub trait ProfileStore: Send + Sync {
    /// The user's stored profile.
    fn get_profile(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;

    /// Update the stored profile. Unset fields are left unchanged.
    fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl ApiClient {
    /// Sign in and install the resulting session.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for bad credentials, or `Decode` if the backend
    /// answered without a token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let body = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let jwt: JwtResponse = self
            .fetch_json(Method::POST, "/auth/login", None, |r| r.json(&body))
            .await?;

        let token = jwt
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Decode("login response carried no token".to_string()))?;

        let session = Session::new(token, identity_from_jwt(jwt));
        add_breadcrumb("auth", "Signed in", None);
        self.session().sign_in(session.clone());
        Ok(session)
    }

    /// Restore a session from a previously issued token.
    ///
    /// The token is checked against `GET /user/info`; the profile supplies
    /// the identity.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token is no longer accepted.
    #[instrument(skip(self, token))]
    pub async fn resume(&self, token: SecretString) -> Result<Session, ApiError> {
        let provisional = Session::new(
            token.clone(),
            Identity {
                id: UserId::new(0),
                username: String::new(),
                email: None,
                roles: Vec::new(),
            },
        );
        let profile = self.get_profile(&provisional).await?;

        let session = Session::new(token, identity_from_profile(profile));
        self.session().sign_in(session.clone());
        Ok(session)
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the server's reason (e.g. username taken).
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        self.fetch_empty(Method::POST, "/auth/signup", None, |r| r.json(request))
            .await
    }

    /// Drop the current session. There is no server-side logout.
    pub fn logout(&self) {
        add_breadcrumb("auth", "Signed out", None);
        self.session().sign_out();
    }
}

impl ProfileStore for ApiClient {
    #[instrument(skip(self, session))]
    async fn get_profile(&self, session: &Session) -> Result<UserProfile, ApiError> {
        self.fetch_json(Method::GET, "/user/info", Some(session), |r| r)
            .await
    }

    #[instrument(skip(self, session, update), fields(user_id = %session.identity().id))]
    async fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<(), ApiError> {
        self.fetch_empty(Method::PUT, "/user/update", Some(session), |r| r.json(update))
            .await
    }
}

fn identity_from_jwt(jwt: JwtResponse) -> Identity {
    Identity {
        id: jwt.id,
        username: jwt.username,
        email: jwt.email.as_deref().and_then(|e| Email::parse(e).ok()),
        roles: jwt.roles.iter().filter_map(RoleEntry::role).collect(),
    }
}

fn identity_from_profile(profile: UserProfile) -> Identity {
    Identity {
        id: profile.id,
        username: profile.username,
        email: profile.email.as_deref().and_then(|e| Email::parse(e).ok()),
        roles: profile.roles.iter().filter_map(RoleEntry::role).collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bookshop_core::Role;

    use super::*;

    #[test]
    fn test_identity_from_jwt() {
        let jwt: JwtResponse = serde_json::from_str(
            r#"{"token": "abc", "id": 12, "username": "ana",
                "email": "ana@example.com", "roles": ["ROLE_ADMIN"]}"#,
        )
        .unwrap();
        let identity = identity_from_jwt(jwt);
        assert_eq!(identity.id, UserId::new(12));
        assert_eq!(identity.email.unwrap().as_str(), "ana@example.com");
        assert_eq!(identity.roles, vec![Role::Admin]);
    }

    #[test]
    fn test_malformed_profile_email_is_dropped() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": 3, "username": "bo", "email": "not-an-email"}"#)
                .unwrap();
        let identity = identity_from_profile(profile);
        assert_eq!(identity.email, None);
        assert!(identity.roles.is_empty());
    }
}
