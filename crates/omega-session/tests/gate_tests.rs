use async_trait::async_trait;
use mockall::mock;
use omega_model::User;
use omega_session::prelude::*;
use omega_session::{is_hashed, IdentitySource};
use omega_store::{RemoteError, RemoteRecord, RemoteStore};
use omega_test_utils::{scenario_state, staffed_state, SCENARIO_CEO_EMAIL, SCENARIO_MONTH};
use pretty_assertions::assert_eq;
use std::sync::Arc;

mock! {
    pub Remote {}

    #[async_trait]
    impl RemoteStore for Remote {
        async fn fetch(&self) -> Result<Option<RemoteRecord>, RemoteError>;
        async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError>;
        async fn fetch_team(&self) -> Result<Vec<User>, RemoteError>;
    }
}

#[tokio::test]
async fn test_first_access_scenario() {
    let mut state = scenario_state();
    assert!(state.month(SCENARIO_MONTH).unwrap().clients.is_empty());
    let gate = SessionGate::new(CredentialPolicy::new().with_hashing(false));

    let identity = gate.resolve_identity(&state.team, "CEO@X.com").await.unwrap();
    assert_eq!(identity.user.email, SCENARIO_CEO_EMAIL);
    assert_eq!(identity.route, AccessRoute::Bootstrap);
    assert_eq!(identity.source, IdentitySource::Local);

    let (user, session) = gate
        .bootstrap_password(&identity.user, "1234", "1234")
        .unwrap();
    assert_eq!(user.password.as_deref(), Some("1234"));
    assert_eq!(session.user_id, user.id);
    state.replace_user(user.clone()).unwrap();

    assert!(gate.authenticate(&user, "1234").is_ok());
    assert_eq!(
        gate.authenticate(&user, "0000").unwrap_err(),
        AuthError::WrongPassword
    );

    let again = gate.resolve_identity(&state.team, " ceo@x.com ").await.unwrap();
    assert_eq!(again.route, AccessRoute::Authenticate);
}

#[tokio::test]
async fn test_default_policy_stores_hash() {
    let state = scenario_state();
    let gate = SessionGate::default();
    let identity = gate.resolve_identity(&state.team, "ceo@x.com").await.unwrap();

    let (user, _) = gate
        .bootstrap_password(&identity.user, "1234", "1234")
        .unwrap();
    let stored = user.password.clone().unwrap();
    assert!(is_hashed(&stored));
    assert_ne!(stored, "1234");
    assert!(gate.authenticate(&user, "1234").is_ok());
    assert!(gate.authenticate(&user, "0000").is_err());
}

#[tokio::test]
async fn test_inactive_is_distinct_from_wrong_password() {
    let (mut state, [_, seller, _]) = staffed_state();
    let gate = SessionGate::default();

    let err = gate.resolve_identity(&state.team, "fay@x.com").await.unwrap_err();
    assert_eq!(err, AuthError::Inactive);
    assert_ne!(err.user_message(), AuthError::WrongPassword.user_message());

    let sam = state.user(&seller).unwrap().clone();
    let (sam, _) = gate.bootstrap_password(&sam, "abcd", "abcd").unwrap();
    state.replace_user(sam.clone()).unwrap();
    state.set_active(&seller, false).unwrap();
    let deactivated = state.user(&seller).unwrap();
    assert_eq!(
        gate.authenticate(deactivated, "abcd").unwrap_err(),
        AuthError::Inactive
    );
}

#[tokio::test]
async fn test_unknown_email() {
    let state = scenario_state();
    let gate = SessionGate::default();
    assert!(matches!(
        gate.resolve_identity(&state.team, "nobody@x.com").await,
        Err(AuthError::UnknownIdentity(_))
    ));
    assert!(matches!(
        gate.resolve_identity(&state.team, "   ").await,
        Err(AuthError::UnknownIdentity(_))
    ));
}

#[tokio::test]
async fn test_remote_roster_fallback() {
    let (remote_state, _) = staffed_state();
    let team = remote_state.team.clone();

    let mut remote = MockRemote::new();
    remote
        .expect_fetch_team()
        .times(1)
        .returning(move || Ok(team.clone()));

    let gate = SessionGate::default().with_remote(Arc::new(remote));
    let local = scenario_state();

    let identity = gate.resolve_identity(&local.team, "ANA@x.com").await.unwrap();
    assert_eq!(identity.source, IdentitySource::Remote);
    assert_eq!(identity.user.name, "Ana Manager");
    assert_eq!(identity.route, AccessRoute::Bootstrap);
}

#[tokio::test]
async fn test_remote_failure_degrades_to_unknown() {
    let mut remote = MockRemote::new();
    remote
        .expect_fetch_team()
        .times(1)
        .returning(|| Err(RemoteError::Unreachable("blocked".into())));

    let gate = SessionGate::default().with_remote(Arc::new(remote));
    let err = gate
        .resolve_identity(&scenario_state().team, "ana@x.com")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::UnknownIdentity("ana@x.com".to_string()));
}

#[tokio::test]
async fn test_local_hit_skips_remote() {
    let mut remote = MockRemote::new();
    remote.expect_fetch_team().never();

    let gate = SessionGate::default().with_remote(Arc::new(remote));
    let identity = gate
        .resolve_identity(&scenario_state().team, "ceo@x.com")
        .await
        .unwrap();
    assert_eq!(identity.source, IdentitySource::Local);
}

#[tokio::test]
async fn test_reset_uses_same_credential_rules() {
    let (state, [manager, ..]) = staffed_state();
    let gate = SessionGate::default();
    let ana = state.user(&manager).unwrap().clone();
    let (ana, _) = gate.bootstrap_password(&ana, "first", "first").unwrap();
    let team = vec![ana.clone()];

    let identity = gate.begin_reset(&team, "ana@x.com").await.unwrap();
    assert_eq!(identity.route, AccessRoute::Reset);
    assert_eq!(
        AccessRoute::for_user(&identity.user),
        AccessRoute::Authenticate
    );

    assert_eq!(
        gate.set_credential(&identity.user, "abc", "abc").unwrap_err(),
        AuthError::PasswordTooShort { min: 4 }
    );
    assert_eq!(
        gate.set_credential(&identity.user, "second", "secnod").unwrap_err(),
        AuthError::PasswordMismatch
    );

    let updated = gate.set_credential(&identity.user, "second", "second").unwrap();
    assert!(gate.authenticate(&updated, "second").is_ok());
    assert_eq!(
        gate.authenticate(&updated, "first").unwrap_err(),
        AuthError::WrongPassword
    );
}
