//! Authentication for PlantCare.
//!
//! An [`AuthProvider`] talks to the identity backend. A [`SessionContext`]
//! sits in front of it, tracks the signed-in user, and decides whether
//! protected screens may be shown.

#![warn(missing_docs)]

mod context;
mod memory;

use std::future::Future;

use async_channel::Receiver;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use context::{Access, GuestAccess, SessionContext};
pub use memory::MemoryAuthProvider;

/// Shortest password accepted for sign up or password change.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A signed-up user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Stable user id; plant records are owned by this id.
    pub id: String,
    /// Sign-in email.
    pub email: String,
}

/// An authenticated session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token. Changes when the session is refreshed.
    pub access_token: String,
    /// The signed-in user.
    pub user: User,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// What happened to the authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// The stored session was loaded at startup.
    InitialSession,
    /// A user signed in.
    SignedIn,
    /// The user signed out.
    SignedOut,
    /// The access token was refreshed.
    TokenRefreshed,
    /// The user's details changed.
    UserUpdated,
}

impl AuthEvent {
    /// Whether this event settles the initial loading state.
    #[must_use]
    pub const fn ends_loading(self) -> bool {
        matches!(
            self,
            Self::InitialSession | Self::SignedIn | Self::SignedOut | Self::TokenRefreshed
        )
    }
}

/// An authentication state change, as broadcast by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    /// What happened.
    pub event: AuthEvent,
    /// The session afterwards, if any.
    pub session: Option<Session>,
}

impl AuthChange {
    /// Access token of the session afterwards.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }
}

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Email or password is wrong.
    #[error("Invalid login credentials")]
    InvalidCredentials,
    /// The email is not a plausible address.
    #[error("Please enter a valid email address")]
    InvalidEmail,
    /// An account with this email already exists.
    #[error("User already registered")]
    EmailTaken,
    /// The password is too short.
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    /// The password confirmation does not match.
    #[error("Passwords don't match")]
    PasswordMismatch,
    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,
    /// The provider failed.
    #[error("authentication service error: {0}")]
    Provider(String),
}

/// Check a new password against the client-side rules.
///
/// # Errors
/// Returns [`AuthError::WeakPassword`] for passwords shorter than
/// [`MIN_PASSWORD_LEN`] characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Check an email address looks deliverable.
///
/// # Errors
/// Returns [`AuthError::InvalidEmail`] if there is no `@` with text on both
/// sides.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AuthError::InvalidEmail),
    }
}

/// An identity backend.
///
/// Providers broadcast every state change to their
/// [`subscribe`](Self::subscribe) receivers, including the ones caused by
/// calls made through this trait.
pub trait AuthProvider: Send + Sync {
    /// Register a new account. The user must still sign in afterwards.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<User, AuthError>> + Send;

    /// Sign in with email and password.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// End the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Change the password of the user owning `session`.
    fn update_password(
        &self,
        session: &Session,
        password: &str,
    ) -> impl Future<Output = Result<User, AuthError>> + Send;

    /// The persisted session, if any.
    fn current_session(&self) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send;

    /// Receive state changes from now on.
    fn subscribe(&self) -> Receiver<AuthChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_needs_six_characters() {
        assert_eq!(validate_password("12345"), Err(AuthError::WeakPassword));
        assert_eq!(validate_password("123456"), Ok(()));
        assert_eq!(validate_password("ñandú1"), Ok(()));
    }

    #[test]
    fn email_needs_local_part_and_domain() {
        assert!(validate_email("fern@example.com").is_ok());
        assert_eq!(validate_email("fern"), Err(AuthError::InvalidEmail));
        assert_eq!(validate_email("@example.com"), Err(AuthError::InvalidEmail));
        assert_eq!(validate_email("fern@localhost"), Err(AuthError::InvalidEmail));
    }

    #[test]
    fn loading_ends_on_settling_events_only() {
        assert!(AuthEvent::InitialSession.ends_loading());
        assert!(AuthEvent::TokenRefreshed.ends_loading());
        assert!(!AuthEvent::UserUpdated.ends_loading());
    }
}
