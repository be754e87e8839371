//! Durable per-device cart snapshots
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `carts` | `session_key` | JSON `Vec<CartLine>` |

use redb::{Database, ReadableDatabase, TableDefinition};
use shared::ErrorCode;
use shared::order::CartLine;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const CARTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("carts");

/// Cart storage errors
#[derive(Debug, Error)]
pub enum CartStorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CartStorageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CartStorageError::Serialization(_) => ErrorCode::StorageCorrupted,
            _ => ErrorCode::CartPersistFailed,
        }
    }
}

pub type CartStorageResult<T> = Result<T, CartStorageError>;

/// Persistent cart snapshots keyed by customer session
pub trait CartStorage: Send + Sync {
    fn load(&self, session_key: &str) -> CartStorageResult<Option<Vec<CartLine>>>;
    fn save(&self, session_key: &str, lines: &[CartLine]) -> CartStorageResult<()>;
    fn remove(&self, session_key: &str) -> CartStorageResult<()>;
}

/// Cart storage backed by redb
#[derive(Clone)]
pub struct RedbCartStorage {
    db: Arc<Database>,
}

impl RedbCartStorage {
    /// Open or create the cart database at the given path
    pub fn open(path: impl AsRef<Path>) -> CartStorageResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> CartStorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> CartStorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CARTS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl CartStorage for RedbCartStorage {
    fn load(&self, session_key: &str) -> CartStorageResult<Option<Vec<CartLine>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CARTS_TABLE)?;
        match table.get(session_key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn save(&self, session_key: &str, lines: &[CartLine]) -> CartStorageResult<()> {
        let bytes = serde_json::to_vec(lines)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CARTS_TABLE)?;
            table.insert(session_key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, session_key: &str) -> CartStorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CARTS_TABLE)?;
            table.remove(session_key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::ProductRef;

    #[test]
    fn test_save_load_remove() {
        let storage = RedbCartStorage::open_in_memory().unwrap();
        assert!(storage.load("cart:c1").unwrap().is_none());

        let lines = vec![CartLine::from_product(
            &ProductRef::new("kurta", "Kurta", 3500.0),
            "M",
            2,
        )];
        storage.save("cart:c1", &lines).unwrap();
        assert_eq!(storage.load("cart:c1").unwrap(), Some(lines));
        assert!(storage.load("cart:c2").unwrap().is_none());

        storage.remove("cart:c1").unwrap();
        assert!(storage.load("cart:c1").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_serialization_error() {
        let storage = RedbCartStorage::open_in_memory().unwrap();
        let write_txn = storage.db.begin_write().unwrap();
        {
            let mut table = write_txn.open_table(CARTS_TABLE).unwrap();
            table.insert("cart:bad", b"not json".as_slice()).unwrap();
        }
        write_txn.commit().unwrap();

        let err = storage.load("cart:bad").unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageCorrupted);
    }
}
