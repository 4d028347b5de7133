use plantcare_auth::{
    Access, AuthError, AuthEvent, AuthProvider, GuestAccess, MemoryAuthProvider, SessionContext,
};

async fn signed_up() -> SessionContext<MemoryAuthProvider> {
    let context = SessionContext::new(MemoryAuthProvider::new());
    context.init().await.unwrap();
    context.sign_up("fern@example.com", "secret1").await.unwrap();
    context
}

#[tokio::test]
async fn guards_wait_for_initial_session() {
    let context = SessionContext::new(MemoryAuthProvider::new());
    assert!(context.is_loading());
    assert_eq!(context.require_user(), Access::Loading);
    assert_eq!(context.require_guest(), GuestAccess::Loading);

    assert_eq!(context.init().await.unwrap(), None);
    assert!(!context.is_loading());
    assert_eq!(context.require_user(), Access::SignInRequired);
    assert_eq!(context.require_guest(), GuestAccess::Granted);
}

#[tokio::test]
async fn persisted_session_is_restored() {
    let provider =
        MemoryAuthProvider::with_persisted_session("fern@example.com", "secret1").unwrap();
    let context = SessionContext::new(provider);

    let restored = context.init().await.unwrap().unwrap();
    assert_eq!(restored.user.email, "fern@example.com");
    assert_eq!(context.require_user(), Access::Granted(restored.user));
    assert_eq!(context.require_guest(), GuestAccess::AlreadySignedIn);
}

#[tokio::test]
async fn sign_in_and_out_update_the_guard() {
    let context = signed_up().await;
    assert_eq!(context.require_user(), Access::SignInRequired);

    let session = context.sign_in("fern@example.com", "secret1").await.unwrap();
    assert_eq!(context.require_user(), Access::Granted(session.user));

    context.sign_out().await.unwrap();
    assert_eq!(context.require_user(), Access::SignInRequired);
    assert_eq!(context.session(), None);
}

#[tokio::test]
async fn same_token_broadcasts_are_ignored() {
    let context = signed_up().await;
    let listener = context.subscribe();

    context.sign_in("fern@example.com", "secret1").await.unwrap();
    // The provider echoes the sign in; the token is the one already held.
    assert_eq!(context.pump(), 1);
    context.provider().rebroadcast(AuthEvent::UserUpdated);
    assert_eq!(context.pump(), 1);

    let first = listener.try_recv().unwrap();
    assert_eq!(first.event, AuthEvent::SignedIn);
    assert!(listener.try_recv().is_err());
}

#[tokio::test]
async fn token_refresh_replaces_the_session() {
    let context = signed_up().await;
    let listener = context.subscribe();
    let before = context.sign_in("fern@example.com", "secret1").await.unwrap();
    context.pump();

    let refreshed = context.provider().refresh_token().unwrap();
    context.pump();

    let session = context.session().unwrap();
    assert_eq!(session.access_token, refreshed.access_token);
    assert_ne!(session.access_token, before.access_token);
    let events: Vec<_> = std::iter::from_fn(|| listener.try_recv().ok())
        .map(|change| change.event)
        .collect();
    assert_eq!(events, [AuthEvent::SignedIn, AuthEvent::TokenRefreshed]);
}

#[tokio::test]
async fn server_side_expiry_signs_the_user_out() {
    let context = signed_up().await;
    context.sign_in("fern@example.com", "secret1").await.unwrap();
    context.pump();

    context.provider().expire_session();
    context.pump();
    assert_eq!(context.require_user(), Access::SignInRequired);
}

#[tokio::test]
async fn broadcast_ends_loading_without_init() {
    let provider = MemoryAuthProvider::new();
    provider.sign_up("fern@example.com", "secret1").await.ok();
    let context = SessionContext::new(provider.clone());
    assert!(context.is_loading());

    provider.rebroadcast(AuthEvent::UserUpdated);
    context.pump();
    assert!(context.is_loading());

    provider.rebroadcast(AuthEvent::SignedOut);
    context.pump();
    assert!(!context.is_loading());
}

#[tokio::test]
async fn short_passwords_never_reach_the_provider() {
    let context = SessionContext::new(MemoryAuthProvider::new());
    assert_eq!(
        context.sign_up("fern@example.com", "12345").await,
        Err(AuthError::WeakPassword)
    );
    assert_eq!(
        context.sign_in("fern@example.com", "12345").await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test]
async fn password_change_checks_confirmation_and_session() {
    let context = signed_up().await;
    assert_eq!(
        context.update_password("secret2", "secret2").await,
        Err(AuthError::NotSignedIn)
    );

    context.sign_in("fern@example.com", "secret1").await.unwrap();
    assert_eq!(
        context.update_password("secret2", "secret3").await,
        Err(AuthError::PasswordMismatch)
    );
    assert_eq!(
        context.update_password("short", "short").await,
        Err(AuthError::WeakPassword)
    );
    context.update_password("secret2", "secret2").await.unwrap();

    context.sign_out().await.unwrap();
    assert!(context.sign_in("fern@example.com", "secret2").await.is_ok());
}
