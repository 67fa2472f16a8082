//! Store behavior against a real encrypted database file.

mod support;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use erpsync_core::{CredentialStore, EntityRecord, EntityStore};
use erpsync_domain::{EntityPayload, ExternalSyncState, SyncCredential, SyncError};
use erpsync_infra::database::{DbManager, SqliteCredentialRepository, SqliteEntityRepository};
use serde_json::json;
use support::{TestDatabase, TEST_DB_KEY};
use tempfile::TempDir;

fn credential(tenant: &str, access: &str) -> SyncCredential {
    let expires = Utc.timestamp_millis_opt((Utc::now() + Duration::hours(1)).timestamp_millis());
    SyncCredential::new(tenant, access, "refresh", expires.unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn credentials_and_entities_share_one_database() {
    let db = TestDatabase::new();
    let credentials = SqliteCredentialRepository::new(Arc::clone(&db.manager));
    let entities = SqliteEntityRepository::new(Arc::clone(&db.manager));

    credentials.save(&credential("acme", "at-1")).await.unwrap();
    let id = entities
        .persist(&EntityRecord {
            payload: EntityPayload::new("acme", "produtos", json!({"nome": "Régua"})),
            external_id: Some("77".into()),
            external_state: ExternalSyncState::Succeeded,
            sync_warning: None,
        })
        .await
        .unwrap();

    assert_eq!(credentials.load("acme").await.unwrap().unwrap().access_token, "at-1");
    let row = entities.find("acme", &id).await.unwrap().unwrap();
    assert_eq!(row.payload.external_id.as_deref(), Some("77"));
    db.manager.health_check().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_saves_leave_one_complete_credential() {
    let db = TestDatabase::new();
    let repo = Arc::new(SqliteCredentialRepository::new(Arc::clone(&db.manager)));

    let mut handles = Vec::new();
    for n in 0..8 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.save(&credential("acme", &format!("at-{n}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = repo.load("acme").await.unwrap().unwrap();
    assert!(stored.access_token.starts_with("at-"));
    assert_eq!(stored.refresh_token, "refresh");
    assert!(stored.is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn data_survives_reopen_with_the_same_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.db");

    {
        let manager = Arc::new(DbManager::new(&path, 2, Some(TEST_DB_KEY)).unwrap());
        manager.run_migrations().unwrap();
        SqliteCredentialRepository::new(manager)
            .save(&credential("acme", "at-1"))
            .await
            .unwrap();
    }

    let manager = Arc::new(DbManager::new(&path, 2, Some(TEST_DB_KEY)).unwrap());
    manager.run_migrations().unwrap();
    let loaded = SqliteCredentialRepository::new(manager).load("acme").await.unwrap();
    assert_eq!(loaded.unwrap().access_token, "at-1");
}

#[test]
fn wrong_key_is_a_store_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("locked.db");
    DbManager::new(&path, 1, Some(TEST_DB_KEY)).unwrap().run_migrations().unwrap();

    let result = DbManager::new(&path, 1, Some("another_key_entirely_bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"))
        .and_then(|manager| manager.health_check());

    assert!(matches!(result, Err(SyncError::Store(_))));
}
