//! Fixture-layer behaviour against the in-memory provider.

use cognito_fixtures::app::clock::{Clock, ManualClock};
use cognito_fixtures::app::config::FixtureConfig;
use cognito_fixtures::app::errors::ProvisionError;
use cognito_fixtures::app::fixtures::{AuthHeaders, FixtureSession};
use cognito_fixtures::app::identity_provider::{InMemoryIdentityProvider, PoolConfig};
use cognito_fixtures::app::parameter_store::StaticParameterStore;
use insta::assert_json_snapshot;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn session() -> (Arc<ManualClock>, Arc<InMemoryIdentityProvider>, FixtureSession) {
    cognito_fixtures::app::logging::init_test_logging();
    let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
    let provider = Arc::new(
        InMemoryIdentityProvider::new(clock.clone())
            .with_pool("pool-1", "app-1")
            .with_group("pool-1", "admingroup")
            .with_group("pool-1", "auditors"),
    );
    let session = FixtureSession::new(provider.clone(), PoolConfig::new("pool-1", "app-1").unwrap())
        .with_clock(clock.clone());
    (clock, provider, session)
}

#[test]
fn test_scoped_identity_deleted_on_drop() {
    let (_clock, provider, session) = session();

    let username = {
        let user = session.plain_user().unwrap();
        assert!(user.exists().unwrap());
        user.username().to_string()
    };

    assert_eq!(provider.user_count("pool-1"), 0);
    assert_eq!(provider.groups_of("pool-1", &username), None);
}

#[test]
fn test_release_reports_deletion_result() {
    let (_clock, provider, session) = session();

    let user = session.plain_user().unwrap();
    user.release().unwrap();
    assert_eq!(provider.user_count("pool-1"), 0);

    let user = session.plain_user().unwrap();
    user.delete().unwrap();
    assert!(matches!(user.release(), Err(ProvisionError::NotFound { .. })));
}

#[test]
fn test_admin_user_joins_configured_group() {
    let (_clock, provider, session) = session();

    let admin = session.admin_user().unwrap();
    assert_eq!(
        provider.groups_of("pool-1", admin.username()),
        Some(vec!["admingroup".to_string()])
    );

    let auditor = session
        .with_admin_group("auditors")
        .user_in_groups(&["auditors", "admingroup"])
        .unwrap();
    assert_eq!(
        provider.groups_of("pool-1", auditor.username()),
        Some(vec!["admingroup".to_string(), "auditors".to_string()])
    );
}

#[test]
fn test_failed_group_join_cleans_up() {
    let (_clock, provider, session) = session();

    let err = session.user_in_groups(&["missing"]).unwrap_err();
    assert_eq!(err.provider_code(), Some("ResourceNotFoundException"));
    assert_eq!(provider.user_count("pool-1"), 0);
}

#[test]
fn test_auth_headers_wait_out_the_enrollment_code() {
    let (clock, _provider, session) = session();

    let mut user = session.plain_user().unwrap();
    let headers = session.auth_headers(&mut user).unwrap();
    assert!(headers.authorization.starts_with("Bearer access."));
    assert_eq!(clock.now().timestamp(), 1_700_000_010);

    // Second set of headers needs another fresh step
    session.auth_headers(&mut user).unwrap();
    assert_eq!(clock.now().timestamp(), 1_700_000_040);
}

#[test]
fn test_header_shape() {
    let headers = AuthHeaders::bearer("eyJraWQiOiJ0ZXN0In0");

    assert_json_snapshot!(headers, @r###"
    {
      "Accept": "application/json",
      "Authorization": "Bearer eyJraWQiOiJ0ZXN0In0"
    }
    "###);

    let map = headers.clone().into_header_map();
    assert_eq!(map.get("Accept").map(String::as_str), Some("application/json"));
    assert!(!format!("{:?}", headers).contains("eyJ"));
}

#[test]
fn test_config_resolution_feeds_session() {
    let (clock, provider, _) = session();
    let store = StaticParameterStore::new()
        .with("/app/test/USER_POOL_ID", "pool-1")
        .with("/app/test/CLIENT_ID", "app-1");
    let config = FixtureConfig {
        user_pool_id_parameter: Some("/app/test/USER_POOL_ID".to_string()),
        client_id_parameter: Some("/app/test/CLIENT_ID".to_string()),
        username_prefix: "fixture+".to_string(),
        ..FixtureConfig::default()
    };

    let pool = config.resolve(&store).unwrap();
    let session = FixtureSession::new(provider.clone(), pool)
        .with_naming(config.naming_policy())
        .with_admin_group(&config.admin_group)
        .with_clock(clock);

    let admin = session.admin_user().unwrap();
    assert!(admin.username().starts_with("fixture+"));
    assert_eq!(session.admin_group(), "admingroup");
}
