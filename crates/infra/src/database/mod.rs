//! SQLite/SQLCipher persistence

pub mod credential_repository;
pub mod entity_repository;
pub mod manager;

pub use credential_repository::SqliteCredentialRepository;
pub use entity_repository::SqliteEntityRepository;
pub use manager::{DbConnection, DbManager};
