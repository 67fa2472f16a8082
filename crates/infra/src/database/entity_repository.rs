//! SQLite-backed internal system of record for mirrored entities

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use erpsync_core::{EntityRecord, EntityStore};
use erpsync_domain::{EntityPayload, ExternalSyncState, Result, SyncError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};
use crate::errors::{map_join_error, InfraError};

/// SQLite implementation of [`EntityStore`]
pub struct SqliteEntityRepository {
    db: Arc<DbManager>,
}

impl SqliteEntityRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Rows of a tenant whose last mirror attempt ended in `state`, oldest
    /// first. Used to find writes that still need to reach the ERP.
    pub async fn list_by_state(
        &self,
        tenant_id: &str,
        state: ExternalSyncState,
    ) -> Result<Vec<EntityRecord>> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();

        task::spawn_blocking(move || -> Result<Vec<EntityRecord>> {
            let conn = db.get_connection()?;
            query_entities_by_state(&conn, &tenant_id, state)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl EntityStore for SqliteEntityRepository {
    async fn persist(&self, record: &EntityRecord) -> Result<String> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> Result<String> {
            let conn = db.get_connection()?;
            upsert_entity(&conn, &record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find(&self, tenant_id: &str, internal_id: &str) -> Result<Option<EntityRecord>> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();
        let internal_id = internal_id.to_string();

        task::spawn_blocking(move || -> Result<Option<EntityRecord>> {
            let conn = db.get_connection()?;
            query_entity(&conn, &tenant_id, &internal_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

const SELECT_COLUMNS: &str = "SELECT id, tenant_id, entity_type, external_id, external_state,
                                     sync_warning, data_json
                              FROM mirrored_entities";

fn upsert_entity(conn: &Connection, record: &EntityRecord) -> Result<String> {
    let id = record
        .payload
        .local_id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let data_json = serde_json::to_string(&record.payload.data).map_err(InfraError::from)?;
    let now = Utc::now().timestamp_millis();

    conn.execute(
        "INSERT INTO mirrored_entities
             (id, tenant_id, entity_type, external_id, external_state, sync_warning,
              data_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(id) DO UPDATE SET
             entity_type = excluded.entity_type,
             external_id = excluded.external_id,
             external_state = excluded.external_state,
             sync_warning = excluded.sync_warning,
             data_json = excluded.data_json,
             updated_at = excluded.updated_at
         WHERE mirrored_entities.tenant_id = excluded.tenant_id",
        params![
            &id,
            &record.payload.tenant_id,
            &record.payload.entity_type,
            &record.external_id,
            record.external_state.as_str(),
            &record.sync_warning,
            &data_json,
            now,
        ],
    )
    .map_err(map_sql_error)
    .and_then(|changed| {
        if changed == 0 {
            Err(SyncError::Store(format!("entity {id} belongs to another tenant")))
        } else {
            Ok(())
        }
    })?;

    Ok(id)
}

fn query_entity(conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<EntityRecord>> {
    let sql = format!("{SELECT_COLUMNS} WHERE tenant_id = ?1 AND id = ?2");

    let raw = conn
        .query_row(&sql, params![tenant_id, id], map_entity_row)
        .optional()
        .map_err(map_sql_error)?;
    raw.map(RawEntity::into_record).transpose()
}

fn query_entities_by_state(
    conn: &Connection,
    tenant_id: &str,
    state: ExternalSyncState,
) -> Result<Vec<EntityRecord>> {
    let sql = format!(
        "{SELECT_COLUMNS} WHERE tenant_id = ?1 AND external_state = ?2 ORDER BY created_at, rowid"
    );

    let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![tenant_id, state.as_str()], map_entity_row)
        .map_err(map_sql_error)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(map_sql_error)?.into_record()?);
    }
    Ok(records)
}

struct RawEntity {
    id: String,
    tenant_id: String,
    entity_type: String,
    external_id: Option<String>,
    external_state: String,
    sync_warning: Option<String>,
    data_json: String,
}

fn map_entity_row(row: &Row<'_>) -> rusqlite::Result<RawEntity> {
    Ok(RawEntity {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        entity_type: row.get(2)?,
        external_id: row.get(3)?,
        external_state: row.get(4)?,
        sync_warning: row.get(5)?,
        data_json: row.get(6)?,
    })
}

impl RawEntity {
    fn into_record(self) -> Result<EntityRecord> {
        let external_state = ExternalSyncState::parse(&self.external_state).ok_or_else(|| {
            SyncError::Store(format!("unknown external_state '{}'", self.external_state))
        })?;
        let data = serde_json::from_str(&self.data_json).map_err(InfraError::from)?;

        let mut payload = EntityPayload::new(self.tenant_id, self.entity_type, data)
            .with_local_id(self.id);
        if let Some(external_id) = &self.external_id {
            payload = payload.with_external_id(external_id.clone());
        }

        Ok(EntityRecord {
            payload,
            external_id: self.external_id,
            external_state,
            sync_warning: self.sync_warning,
        })
    }
}
