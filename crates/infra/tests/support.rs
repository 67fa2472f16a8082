#![allow(dead_code)]

use std::sync::Arc;

use erpsync_domain::constants::DEFAULT_USER_AGENT;
use erpsync_domain::{
    BatchConfig, ClassifierConfig, Config, DatabaseConfig, ErpConfig, RetryConfig, TokenConfig,
};
use erpsync_infra::database::DbManager;
use tempfile::TempDir;

pub const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new migrated, encrypted temporary database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager =
            DbManager::new(&db_path, 4, Some(TEST_DB_KEY)).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Full configuration pointing the ERP at `server_uri` and the database into
/// `dir`, with short delays so tests stay fast.
pub fn test_config(server_uri: &str, dir: &TempDir) -> Config {
    Config {
        database: DatabaseConfig {
            path: dir.path().join("erpsync.db").to_string_lossy().into_owned(),
            pool_size: 2,
            encryption_key: Some(TEST_DB_KEY.to_string()),
        },
        erp: ErpConfig {
            api_base_url: format!("{server_uri}/Api/v3"),
            token_url: format!("{server_uri}/Api/v3/oauth/token"),
            authorize_url: Some(format!("{server_uri}/Api/v3/oauth/authorize")),
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: Some("https://app.test/callback".into()),
            request_timeout_secs: 5,
            user_agent: DEFAULT_USER_AGENT.into(),
        },
        retry: RetryConfig { max_retries: 2, base_delay_ms: 10, max_delay_ms: 50 },
        batch: BatchConfig { item_interval_ms: 10 },
        auth: TokenConfig::default(),
        classifier: ClassifierConfig::default(),
    }
}

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
