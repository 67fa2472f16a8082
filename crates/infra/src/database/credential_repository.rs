//! SQLite-backed per-tenant credential store
//!
//! One row per tenant. `save` is an upsert, so concurrent writers resolve to
//! last-write-wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use erpsync_core::CredentialStore;
use erpsync_domain::{Result, SyncCredential, SyncError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::manager::{map_sql_error, DbManager};
use crate::errors::map_join_error;

/// SQLite implementation of [`CredentialStore`]
pub struct SqliteCredentialRepository {
    db: Arc<DbManager>,
}

impl SqliteCredentialRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialRepository {
    async fn load(&self, tenant_id: &str) -> Result<Option<SyncCredential>> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();

        task::spawn_blocking(move || -> Result<Option<SyncCredential>> {
            let conn = db.get_connection()?;
            query_credential(&conn, &tenant_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, credential: &SyncCredential) -> Result<()> {
        let db = Arc::clone(&self.db);
        let credential = credential.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            upsert_credential(&conn, &credential)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn revoke(&self, tenant_id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            revoke_credential(&conn, &tenant_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_credential(conn: &Connection, tenant_id: &str) -> Result<Option<SyncCredential>> {
    let sql = "SELECT tenant_id, access_token, refresh_token, expires_at, revoked, updated_at
               FROM sync_credentials WHERE tenant_id = ?1";

    let raw = conn
        .query_row(sql, params![tenant_id], map_credential_row)
        .optional()
        .map_err(map_sql_error)?;
    raw.map(RawCredential::into_credential).transpose()
}

fn upsert_credential(conn: &Connection, credential: &SyncCredential) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_credentials
             (tenant_id, access_token, refresh_token, expires_at, revoked, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(tenant_id) DO UPDATE SET
             access_token = excluded.access_token,
             refresh_token = excluded.refresh_token,
             expires_at = excluded.expires_at,
             revoked = excluded.revoked,
             updated_at = excluded.updated_at",
        params![
            &credential.tenant_id,
            &credential.access_token,
            &credential.refresh_token,
            credential.expires_at.timestamp_millis(),
            credential.revoked,
            credential.updated_at.timestamp_millis(),
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn revoke_credential(conn: &Connection, tenant_id: &str) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE sync_credentials SET revoked = 1, updated_at = ?2
             WHERE tenant_id = ?1 AND revoked = 0",
            params![tenant_id, Utc::now().timestamp_millis()],
        )
        .map_err(map_sql_error)?;
    Ok(changed > 0)
}

struct RawCredential {
    tenant_id: String,
    access_token: String,
    refresh_token: String,
    expires_at_ms: i64,
    revoked: bool,
    updated_at_ms: i64,
}

fn map_credential_row(row: &Row<'_>) -> rusqlite::Result<RawCredential> {
    Ok(RawCredential {
        tenant_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        expires_at_ms: row.get(3)?,
        revoked: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

impl RawCredential {
    fn into_credential(self) -> Result<SyncCredential> {
        Ok(SyncCredential {
            expires_at: millis_to_datetime(self.expires_at_ms)?,
            updated_at: millis_to_datetime(self.updated_at_ms)?,
            tenant_id: self.tenant_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            revoked: self.revoked,
        })
    }
}

pub(crate) fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| SyncError::Store(format!("invalid stored timestamp: {ms}")))
}
