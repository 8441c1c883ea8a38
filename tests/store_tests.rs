//! Integration tests for token storage: file round-trips, corruption
//! handling and per-platform backend selection.

mod auth_support;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use auth_support::token;
use lms_session::auth::{
    store_for_platform, AuthError, FileTokenStore, Token, TokenStore, TokenStoreConfig,
};
use lms_session::config::{ClientConfig, Platform};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_store() -> (TempDir, FileTokenStore) {
    let dir = TempDir::new().expect("tempdir");
    let store = FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()));
    (dir, store)
}

fn config_with_dir(dir: &TempDir, platform: Platform) -> ClientConfig {
    ClientConfig::builder()
        .api_base_url("https://lms.example.com/api")
        .tenant("acme-academy")
        .platform(platform)
        .token_dir(dir.path().to_path_buf())
        .build()
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_store_round_trip_preserves_all_fields() {
    let (_dir, store) = temp_store();

    let original = Token {
        access_token: "acc-123".to_string(),
        refresh_token: Some("ref-456".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(2)),
        last_refresh: Some(Utc::now()),
    };
    store
        .save("acme-academy", &original)
        .await
        .expect("save should succeed");

    let loaded = store
        .load("acme-academy")
        .await
        .expect("load should succeed")
        .expect("token should exist");
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn file_store_reports_expiry_of_stored_token() {
    let (_dir, store) = temp_store();
    let expires_at = Utc::now() + Duration::minutes(15);

    assert_eq!(store.expiry("acme-academy").await.unwrap(), None);

    store
        .save("acme-academy", &token("access", Some(expires_at)))
        .await
        .unwrap();
    assert_eq!(
        store.expiry("acme-academy").await.unwrap(),
        Some(expires_at)
    );

    store
        .save("acme-academy", &token("opaque", None))
        .await
        .unwrap();
    assert_eq!(store.expiry("acme-academy").await.unwrap(), None);
}

#[tokio::test]
async fn file_store_keeps_tenants_apart() {
    let (_dir, store) = temp_store();
    store.save("acme", &token("acme-access", None)).await.unwrap();
    store.save("globex", &token("globex-access", None)).await.unwrap();

    store.clear("acme").await.unwrap();

    assert!(store.load("acme").await.unwrap().is_none());
    assert_eq!(
        store.load("globex").await.unwrap().unwrap().access_token,
        "globex-access"
    );
}

#[tokio::test]
async fn clearing_a_missing_session_is_ok() {
    let (_dir, store) = temp_store();
    store.clear("never-logged-in").await.expect("clear is idempotent");
}

#[tokio::test]
async fn file_store_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let store = FileTokenStore::new(TokenStoreConfig::new(nested.clone()));

    store.save("acme", &token("access", None)).await.unwrap();

    assert!(nested.join("acme.toml").exists());
}

#[tokio::test]
async fn corrupted_token_file_is_a_serialization_error() {
    let (dir, store) = temp_store();
    std::fs::write(dir.path().join("acme.toml"), "this is = not [valid").unwrap();

    let err = store.load("acme").await.unwrap_err();
    assert!(matches!(err, AuthError::Serialization(_)), "got {err:?}");
}

#[tokio::test]
async fn unknown_file_version_is_rejected() {
    let (dir, store) = temp_store();
    std::fs::write(
        dir.path().join("acme.toml"),
        r#"
version = 99
tenant = "acme"
saved_at = "2026-03-01T12:00:00Z"

[token]
access_token = "access"
"#,
    )
    .unwrap();

    let err = store.load("acme").await.unwrap_err();
    match err {
        AuthError::Storage(message) => assert!(message.contains("version 99")),
        other => panic!("expected Storage error, got {other:?}"),
    }
}

#[tokio::test]
async fn token_file_records_tenant_and_version() {
    let (dir, store) = temp_store();
    store.save("acme", &token("access", None)).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("acme.toml")).unwrap();
    let value: toml::Value = toml::from_str(&raw).unwrap();
    assert_eq!(value["version"].as_integer(), Some(1));
    assert_eq!(value["tenant"].as_str(), Some("acme"));
    assert_eq!(value["token"]["access_token"].as_str(), Some("access"));
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn native_platform_persists_to_token_dir() {
    let dir = TempDir::new().unwrap();
    let config = config_with_dir(&dir, Platform::Native);

    let store = store_for_platform(&config);
    store
        .save(&config.tenant, &token("native", None))
        .await
        .unwrap();

    assert!(dir.path().join("acme-academy.toml").exists());
    let reopened = store_for_platform(&config);
    assert_eq!(
        reopened.load(&config.tenant).await.unwrap().unwrap().access_token,
        "native"
    );
}

#[tokio::test]
async fn web_platform_keeps_session_in_memory_only() {
    let dir = TempDir::new().unwrap();
    let config = config_with_dir(&dir, Platform::Web);

    let store = store_for_platform(&config);
    store.save(&config.tenant, &token("web", None)).await.unwrap();

    assert!(store.load(&config.tenant).await.unwrap().is_some());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(store_for_platform(&config)
        .load(&config.tenant)
        .await
        .unwrap()
        .is_none());
}
