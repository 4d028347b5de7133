use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_channel::{Receiver, Sender, TrySendError, unbounded};
use log::{debug, info, warn};

use crate::{
    AuthChange, AuthError, AuthEvent, AuthProvider, Session, User, validate_email,
    validate_password,
};

/// Whether a protected screen may be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The session is still being restored; show a loading indicator.
    Loading,
    /// A user is signed in.
    Granted(User),
    /// Nobody is signed in; send the user to the sign-in screen.
    SignInRequired,
}

/// Whether a sign-in or sign-up screen may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestAccess {
    /// The session is still being restored.
    Loading,
    /// Nobody is signed in.
    Granted,
    /// A user is already signed in; send them to the garden.
    AlreadySignedIn,
}

struct State {
    session: Option<Session>,
    loading: bool,
}

/// The application's view of who is signed in.
///
/// Starts out loading. [`init`](Self::init) restores any persisted session;
/// afterwards provider broadcasts are folded in by [`run`](Self::run) or
/// [`pump`](Self::pump). A broadcast whose access token matches the current
/// one is ignored, so the session (and every listener) only sees real
/// changes.
pub struct SessionContext<P> {
    provider: P,
    state: Mutex<State>,
    changes: Receiver<AuthChange>,
    listeners: Mutex<Vec<Sender<AuthChange>>>,
}

impl<P: AuthProvider> SessionContext<P> {
    /// Wrap `provider`, subscribing to its broadcasts.
    pub fn new(provider: P) -> Self {
        let changes = provider.subscribe();
        Self {
            provider,
            state: Mutex::new(State {
                session: None,
                loading: true,
            }),
            changes,
            listeners: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restore the persisted session. Loading ends either way.
    ///
    /// # Errors
    /// Returns the provider's error if the session could not be read; the
    /// context then treats the user as signed out.
    pub async fn init(&self) -> Result<Option<Session>, AuthError> {
        let restored = self.provider.current_session().await;
        let session = restored.as_ref().ok().cloned().flatten();
        self.apply(AuthChange {
            event: AuthEvent::InitialSession,
            session: session.clone(),
        });
        restored.map(|_| session)
    }

    /// Fold one state change in. Returns `true` if the session changed.
    pub fn apply(&self, change: AuthChange) -> bool {
        let mut state = self.lock();
        let changed = state.session.as_ref().map(|s| s.access_token.as_str())
            != change.access_token();
        if changed {
            state.session.clone_from(&change.session);
        }
        if state.loading && change.event.ends_loading() {
            state.loading = false;
            debug!("auth loading finished on {:?}", change.event);
        }
        drop(state);

        if changed {
            debug!("session changed on {:?}", change.event);
            self.notify(&change);
        } else {
            debug!("ignoring {:?}: token unchanged", change.event);
        }
        changed
    }

    fn notify(&self, change: &AuthChange) {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|sender| match sender.try_send(change.clone()) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => false,
            Err(err) => {
                warn!("dropping auth event: {err}");
                true
            }
        });
    }

    /// Fold in every broadcast already queued by the provider. Returns how
    /// many were read.
    pub fn pump(&self) -> usize {
        let mut read = 0;
        while let Ok(change) = self.changes.try_recv() {
            self.apply(change);
            read += 1;
        }
        read
    }

    /// Fold in provider broadcasts until the provider goes away.
    pub async fn run(&self) {
        while let Ok(change) = self.changes.recv().await {
            self.apply(change);
        }
    }

    /// Receive every session change from now on.
    pub fn subscribe(&self) -> Receiver<AuthChange> {
        let (sender, receiver) = unbounded();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// The current session.
    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// The signed-in user.
    pub fn user(&self) -> Option<User> {
        self.lock().session.as_ref().map(|s| s.user.clone())
    }

    /// Whether the initial session is still being restored.
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Guard for screens that need a signed-in user.
    pub fn require_user(&self) -> Access {
        let state = self.lock();
        if state.loading {
            return Access::Loading;
        }
        state
            .session
            .as_ref()
            .map_or(Access::SignInRequired, |s| Access::Granted(s.user.clone()))
    }

    /// Guard for the sign-in and sign-up screens.
    pub fn require_guest(&self) -> GuestAccess {
        let state = self.lock();
        if state.loading {
            GuestAccess::Loading
        } else if state.session.is_some() {
            GuestAccess::AlreadySignedIn
        } else {
            GuestAccess::Granted
        }
    }

    /// Create an account. The user still has to sign in.
    ///
    /// # Errors
    /// Rejects malformed emails and passwords shorter than
    /// [`MIN_PASSWORD_LEN`](crate::MIN_PASSWORD_LEN) before reaching the
    /// provider.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        let user = self.provider.sign_up(email, password).await?;
        info!("account created for {}", user.email);
        Ok(user)
    }

    /// Sign in and adopt the new session.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] for a wrong email or
    /// password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_email(email)?;
        let session = self
            .provider
            .sign_in(email, password)
            .await
            .inspect_err(|e| warn!("sign in failed: {e}"))?;
        self.apply(AuthChange {
            event: AuthEvent::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    /// Sign out and drop the session.
    ///
    /// # Errors
    /// Returns the provider's error; the local session is kept in that case.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        self.apply(AuthChange {
            event: AuthEvent::SignedOut,
            session: None,
        });
        Ok(())
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    /// Returns [`AuthError::PasswordMismatch`] if `confirmation` differs,
    /// [`AuthError::WeakPassword`] for short passwords and
    /// [`AuthError::NotSignedIn`] without a session.
    pub async fn update_password(
        &self,
        password: &str,
        confirmation: &str,
    ) -> Result<User, AuthError> {
        if password != confirmation {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(password)?;
        let session = self.session().ok_or(AuthError::NotSignedIn)?;
        let user = self.provider.update_password(&session, password).await?;
        info!("password updated for {}", user.email);
        Ok(user)
    }

    /// The wrapped provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> fmt::Debug for SessionContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionContext")
            .field("session", &state.session)
            .field("loading", &state.loading)
            .finish_non_exhaustive()
    }
}
