//! redb-based order storage
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | JSON `Order` | Order documents |
//! | `shop_orders` | `(shop_id, order_id)` | `created_at` | Per-shop index |
//! | `customer_orders` | `(customer_id, order_id)` | `created_at` | Per-customer index |
//! | `pending_orders` | `order_id` | `expires_at` | Orders still awaiting acceptance |
//! | `submissions` | `submission_id` | `order_id` | Idempotent creation |
//! | `sequence_counter` | `"seq"` | `u64` | Global commit sequence |
//!
//! Every write is one redb transaction, so an order and its index entries
//! always commit together.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::order::{Order, OrderQuery, OrderStatus};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

const SHOP_INDEX_TABLE: TableDefinition<(&str, &str), i64> = TableDefinition::new("shop_orders");

const CUSTOMER_INDEX_TABLE: TableDefinition<(&str, &str), i64> =
    TableDefinition::new("customer_orders");

const PENDING_TABLE: TableDefinition<&str, i64> = TableDefinition::new("pending_orders");

const SUBMISSIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("submissions");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
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

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Version conflict on order {}: now at version {}", current.order_id, current.version)]
    Conflict { current: Box<Order> },
}

impl StorageError {
    /// Damaged data that no retry can repair
    pub fn is_corrupted(&self) -> bool {
        let inner = match self {
            StorageError::Serialization(_) => return true,
            StorageError::Storage(e)
            | StorageError::Database(redb::DatabaseError::Storage(e))
            | StorageError::Transaction(redb::TransactionError::Storage(e))
            | StorageError::Table(redb::TableError::Storage(e))
            | StorageError::Commit(redb::CommitError::Storage(e)) => e,
            _ => return false,
        };
        matches!(inner, redb::StorageError::Corrupted(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of an order creation
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// New order committed at `sequence`
    Created { order: Order, sequence: u64 },
    /// The submission id was already processed; the existing order is returned
    Duplicate(Order),
}

/// Committed status write
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub before: Order,
    pub after: Order,
    pub sequence: u64,
}

fn load_order(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    order_id: &str,
) -> StorageResult<Option<Order>> {
    match table.get(order_id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns, the order survives a crash.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(SHOP_INDEX_TABLE)?;
            let _ = write_txn.open_table(CUSTOMER_INDEX_TABLE)?;
            let _ = write_txn.open_table(PENDING_TABLE)?;
            let _ = write_txn.open_table(SUBMISSIONS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Sequence ==========

    fn increment_sequence(txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    /// Sequence of the last committed write
    pub fn current_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Writes ==========

    /// Create an order, or return the existing one for a repeated submission id
    pub fn create_order(&self, mut order: Order) -> StorageResult<CreateOutcome> {
        let txn = self.db.begin_write()?;

        let existing_id = {
            let submissions = txn.open_table(SUBMISSIONS_TABLE)?;
            submissions
                .get(order.submission_id.as_str())?
                .map(|guard| guard.value().to_string())
        };
        if let Some(existing_id) = existing_id {
            let orders = txn.open_table(ORDERS_TABLE)?;
            let existing = load_order(&orders, &existing_id)?
                .ok_or_else(|| StorageError::OrderNotFound(existing_id.clone()))?;
            drop(orders);
            txn.abort()?;
            return Ok(CreateOutcome::Duplicate(existing));
        }

        let sequence = Self::increment_sequence(&txn)?;
        order.sequence = sequence;
        {
            let bytes = serde_json::to_vec(&order)?;
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            orders.insert(order.order_id.as_str(), bytes.as_slice())?;

            let mut shop_index = txn.open_table(SHOP_INDEX_TABLE)?;
            shop_index.insert(
                (order.shop_id.as_str(), order.order_id.as_str()),
                order.created_at,
            )?;

            let mut customer_index = txn.open_table(CUSTOMER_INDEX_TABLE)?;
            customer_index.insert(
                (order.customer_id.as_str(), order.order_id.as_str()),
                order.created_at,
            )?;

            if order.status == OrderStatus::Pending {
                let mut pending = txn.open_table(PENDING_TABLE)?;
                pending.insert(order.order_id.as_str(), order.expires_at)?;
            }

            let mut submissions = txn.open_table(SUBMISSIONS_TABLE)?;
            submissions.insert(order.submission_id.as_str(), order.order_id.as_str())?;
        }
        txn.commit()?;

        Ok(CreateOutcome::Created { order, sequence })
    }

    /// Apply `mutate` to an order if it is still at `expected_version`
    ///
    /// The version is bumped on success. A stale version aborts with
    /// [`StorageError::Conflict`] carrying the current document.
    pub fn update_if_version(
        &self,
        order_id: &str,
        expected_version: u64,
        mutate: impl FnOnce(&mut Order),
    ) -> StorageResult<UpdateOutcome> {
        let txn = self.db.begin_write()?;
        let (before, after, sequence) = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let before = load_order(&orders, order_id)?
                .ok_or_else(|| StorageError::OrderNotFound(order_id.to_string()))?;
            if before.version != expected_version {
                drop(orders);
                txn.abort()?;
                return Err(StorageError::Conflict {
                    current: Box::new(before),
                });
            }

            let sequence = Self::increment_sequence(&txn)?;
            let mut after = before.clone();
            mutate(&mut after);
            after.version = before.version + 1;
            after.sequence = sequence;

            let bytes = serde_json::to_vec(&after)?;
            orders.insert(order_id, bytes.as_slice())?;

            let mut pending = txn.open_table(PENDING_TABLE)?;
            if after.status == OrderStatus::Pending {
                pending.insert(order_id, after.expires_at)?;
            } else {
                pending.remove(order_id)?;
            }
            (before, after, sequence)
        };
        txn.commit()?;

        Ok(UpdateOutcome {
            before,
            after,
            sequence,
        })
    }

    // ========== Reads ==========

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        load_order(&orders, order_id)
    }

    /// Orders matching `query` (newest first) and the sequence they reflect
    ///
    /// Both come from the same read transaction.
    pub fn query(&self, query: &OrderQuery) -> StorageResult<(Vec<Order>, u64)> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let sequence = read_txn
            .open_table(SEQUENCE_TABLE)?
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);

        let candidate_ids: Vec<String> = if let Some(shop_id) = query.shop_id.as_deref() {
            let index = read_txn.open_table(SHOP_INDEX_TABLE)?;
            Self::ids_with_prefix(&index, shop_id)?
        } else if let Some(customer_id) = query.customer_id.as_deref() {
            let index = read_txn.open_table(CUSTOMER_INDEX_TABLE)?;
            Self::ids_with_prefix(&index, customer_id)?
        } else if query.status == Some(OrderStatus::Pending) {
            let pending = read_txn.open_table(PENDING_TABLE)?;
            let mut ids = Vec::with_capacity(pending.len()? as usize);
            for entry in pending.iter()? {
                let (key, expires_at) = entry?;
                if query.expires_before.is_none_or(|t| expires_at.value() < t) {
                    ids.push(key.value().to_string());
                }
            }
            ids
        } else {
            let mut ids = Vec::with_capacity(orders.len()? as usize);
            for entry in orders.iter()? {
                let (key, _) = entry?;
                ids.push(key.value().to_string());
            }
            ids
        };

        let mut result = Vec::new();
        for id in candidate_ids {
            match load_order(&orders, &id)? {
                Some(order) if query.matches(&order) => result.push(order),
                Some(_) => {}
                None => tracing::warn!(order_id = %id, "Index entry without order document"),
            }
        }
        OrderQuery::sort(&mut result);
        Ok((result, sequence))
    }

    /// Order ids under `prefix` in a `(owner_id, order_id)` index
    fn ids_with_prefix(
        index: &impl ReadableTable<(&'static str, &'static str), i64>,
        prefix: &str,
    ) -> StorageResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in index.range((prefix, "")..)? {
            let (key, _) = entry?;
            let (owner, order_id) = key.value();
            if owner != prefix {
                break;
            }
            ids.push(order_id.to_string());
        }
        Ok(ids)
    }
}
