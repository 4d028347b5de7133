use std::collections::HashMap;
use std::fmt;
use std::future::{self, Future};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_channel::{Receiver, Sender, TrySendError, unbounded};
use log::{info, warn};
use uuid::Uuid;

use crate::{
    AuthChange, AuthError, AuthEvent, AuthProvider, Session, User, validate_email,
    validate_password,
};

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    subscribers: Vec<Sender<AuthChange>>,
}

impl Inner {
    fn broadcast(&mut self, event: AuthEvent) {
        let change = AuthChange {
            event,
            session: self.session.clone(),
        };
        self.subscribers
            .retain(|sender| match sender.try_send(change.clone()) {
                Ok(()) => true,
                Err(TrySendError::Closed(_)) => false,
                Err(err) => {
                    warn!("dropping auth event: {err}");
                    true
                }
            });
    }

    fn open_session(&mut self, user: User) -> Session {
        let session = Session {
            access_token: new_token(),
            user,
        };
        self.session = Some(session.clone());
        session
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// An in-memory [`AuthProvider`].
///
/// Accounts need no email confirmation. Clones share the same accounts and
/// session, so tests can keep a handle to drive token refreshes and
/// expiry from the "server" side.
#[derive(Clone, Default)]
pub struct MemoryAuthProvider {
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for MemoryAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryAuthProvider")
            .field("accounts", &inner.accounts.len())
            .field("signed_in", &inner.session.is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryAuthProvider {
    /// Create a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a provider with one account that is already signed in, as if a
    /// session had been persisted by an earlier run.
    ///
    /// # Errors
    /// Fails if the email or password is not acceptable.
    pub fn with_persisted_session(email: &str, password: &str) -> Result<Self, AuthError> {
        let provider = Self::new();
        let user = provider.register(email, password)?;
        provider.lock().open_session(user);
        Ok(provider)
    }

    fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        let email = normalize(email);
        let mut inner = self.lock();
        if inner.accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
        };
        inner.accounts.insert(
            email,
            Account {
                user: user.clone(),
                password: password.to_owned(),
            },
        );
        info!("registered {}", user.email);
        Ok(user)
    }

    fn sign_in_now(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut inner = self.lock();
        let user = inner
            .accounts
            .get(&normalize(email))
            .filter(|account| account.password == password)
            .map(|account| account.user.clone())
            .ok_or(AuthError::InvalidCredentials)?;
        let session = inner.open_session(user);
        inner.broadcast(AuthEvent::SignedIn);
        info!("{} signed in", session.user.email);
        Ok(session)
    }

    fn sign_out_now(&self) {
        let mut inner = self.lock();
        if let Some(session) = inner.session.take() {
            info!("{} signed out", session.user.email);
        }
        inner.broadcast(AuthEvent::SignedOut);
    }

    fn update_password_now(&self, session: &Session, password: &str) -> Result<User, AuthError> {
        validate_password(password)?;
        let mut inner = self.lock();
        let current = inner
            .session
            .as_ref()
            .filter(|current| current.access_token == session.access_token)
            .map(|current| normalize(&current.user.email))
            .ok_or(AuthError::NotSignedIn)?;
        let account = inner
            .accounts
            .get_mut(&current)
            .ok_or(AuthError::NotSignedIn)?;
        account.password = password.to_owned();
        let user = account.user.clone();
        inner.broadcast(AuthEvent::UserUpdated);
        Ok(user)
    }

    /// Issue a fresh access token for the current session and broadcast
    /// [`AuthEvent::TokenRefreshed`]. Returns the new session.
    pub fn refresh_token(&self) -> Option<Session> {
        let mut inner = self.lock();
        let user = inner.session.as_ref()?.user.clone();
        let session = inner.open_session(user);
        inner.broadcast(AuthEvent::TokenRefreshed);
        Some(session)
    }

    /// Broadcast `event` again with the current session and token unchanged.
    pub fn rebroadcast(&self, event: AuthEvent) {
        self.lock().broadcast(event);
    }

    /// End the session from the server side, as an expired refresh token
    /// would.
    pub fn expire_session(&self) {
        self.sign_out_now();
    }
}

impl AuthProvider for MemoryAuthProvider {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<User, AuthError>> + Send {
        future::ready(self.register(email, password))
    }

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send {
        future::ready(self.sign_in_now(email, password))
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send {
        self.sign_out_now();
        future::ready(Ok(()))
    }

    fn update_password(
        &self,
        session: &Session,
        password: &str,
    ) -> impl Future<Output = Result<User, AuthError>> + Send {
        future::ready(self.update_password_now(session, password))
    }

    fn current_session(&self) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send {
        future::ready(Ok(self.lock().session.clone()))
    }

    fn subscribe(&self) -> Receiver<AuthChange> {
        let (sender, receiver) = unbounded();
        self.lock().subscribers.push(sender);
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_requires_matching_password() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("Fern@Example.com", "secret1").await.unwrap();

        assert_eq!(
            provider.sign_in("fern@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
        let session = provider.sign_in(" fern@example.com ", "secret1").await.unwrap();
        assert_eq!(session.user.email, "fern@example.com");
        assert_eq!(provider.current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("fern@example.com", "secret1").await.unwrap();
        assert_eq!(
            provider.sign_up("FERN@example.com", "another1").await,
            Err(AuthError::EmailTaken)
        );
    }

    #[tokio::test]
    async fn changes_are_broadcast() {
        let provider = MemoryAuthProvider::new();
        let events = provider.subscribe();
        provider.sign_up("fern@example.com", "secret1").await.unwrap();
        let session = provider.sign_in("fern@example.com", "secret1").await.unwrap();
        let refreshed = provider.refresh_token().unwrap();
        provider.sign_out().await.unwrap();

        let first = events.try_recv().unwrap();
        assert_eq!(first.event, AuthEvent::SignedIn);
        assert_eq!(first.session, Some(session.clone()));
        let second = events.try_recv().unwrap();
        assert_eq!(second.event, AuthEvent::TokenRefreshed);
        assert_ne!(refreshed.access_token, session.access_token);
        let third = events.try_recv().unwrap();
        assert_eq!(third, AuthChange { event: AuthEvent::SignedOut, session: None });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn password_update_needs_the_live_session() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("fern@example.com", "secret1").await.unwrap();
        let stale = provider.sign_in("fern@example.com", "secret1").await.unwrap();
        let live = provider.refresh_token().unwrap();

        assert_eq!(
            provider.update_password(&stale, "secret2").await,
            Err(AuthError::NotSignedIn)
        );
        assert_eq!(
            provider.update_password(&live, "short").await,
            Err(AuthError::WeakPassword)
        );
        provider.update_password(&live, "secret2").await.unwrap();
        provider.sign_out().await.unwrap();
        assert!(provider.sign_in("fern@example.com", "secret2").await.is_ok());
    }
}
