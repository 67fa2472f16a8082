//! Database connection manager backed by an r2d2 SQLite/SQLCipher pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use erpsync_domain::{DatabaseConfig, Result, SyncError};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use tracing::{info, instrument, warn};

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Owns the connection pool for the internal store.
#[derive(Clone)]
pub struct DbManager {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the database with the given pool size.
    ///
    /// With an `encryption_key` every pooled connection is keyed through
    /// `PRAGMA key` before anything else touches it; a wrong key surfaces
    /// here as a `Store` error.
    #[instrument(skip_all, fields(db_path = %db_path.as_ref().display(), pool_size = pool_size))]
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let key = encryption_key.map(str::to_owned);
        let encrypted = key.is_some();

        let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
            if let Some(key) = key.as_deref() {
                conn.pragma_update(None, "key", key)?;
            }
            apply_connection_pragmas(conn)
        });

        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|err| {
                warn!(error = %err, "failed to create connection pool");
                SyncError::from(InfraError::from(err))
            })?;

        info!(max_connections = pool.max_size(), encrypted, "sqlite pool initialised");
        Ok(Self { pool, path })
    }

    /// Build from the `database` config section.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.path, config.pool_size, config.encryption_key.as_deref())
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<DbConnection> {
        self.pool.get().map_err(|err| InfraError::from(err).into())
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection and run a trivial query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}

// Runs on every new pooled connection. Reading `sqlite_master` first makes a
// wrong SQLCipher key fail at pool creation instead of on the first query.
fn apply_connection_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;\n\
         PRAGMA synchronous=NORMAL;\n\
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> SyncError {
    SyncError::from(InfraError::from(err))
}
