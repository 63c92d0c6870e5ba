//! Durable storage for wallets, ledger entries, orders and ownership records.
//!
//! Services depend only on [`Store`] and [`StoreTransaction`]. Every write
//! goes through a transaction; row-locking reads inside the transaction are
//! the per-owner and per-order serialization points. Dropping a transaction
//! without calling [`StoreTransaction::commit`] discards all of its writes.

pub mod ledger_repository;
pub mod memory;
pub mod order_repository;
pub mod ownership_repository;
pub mod postgres;
pub mod wallet_repository;

pub use ledger_repository::LedgerRepository;
pub use memory::MemoryStore;
pub use order_repository::OrderRepository;
pub use ownership_repository::OwnershipRepository;
pub use postgres::PgStore;
pub use wallet_repository::WalletRepository;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{LedgerEntry, Order, OrderTransition, OwnershipRecord, Wallet};

/// Database connection pool type alias.
pub type DbPool = PgPool;

/// Entry point to a storage backend.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    async fn find_wallet(&self, owner_id: i64) -> Result<Option<Wallet>>;

    /// Ledger entries of an owner, newest first.
    async fn list_entries(&self, owner_id: i64, limit: i64, offset: i64)
        -> Result<Vec<LedgerEntry>>;

    async fn list_ownership(&self, owner_id: i64) -> Result<Vec<OwnershipRecord>>;

    async fn find_order(&self, order_no: &str) -> Result<Option<Order>>;

    /// Inserts a pending order. Used by the order-creation flow.
    async fn insert_order(&self, order: &Order) -> Result<Order>;

    /// Sets or clears the frozen flag outside any transaction. Returns false
    /// if the wallet does not exist.
    async fn set_wallet_frozen(&self, owner_id: i64, frozen: bool) -> Result<bool>;
}

/// Reads and writes that commit or roll back together.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads the wallet and holds its lock until the transaction ends.
    async fn lock_wallet(&mut self, owner_id: i64) -> Result<Option<Wallet>>;

    /// Creates an empty wallet if none exists, then locks and returns it.
    async fn lock_or_create_wallet(&mut self, owner_id: i64) -> Result<Wallet>;

    async fn update_balance(&mut self, owner_id: i64, balance: i64) -> Result<Wallet>;

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<()>;

    /// Sum of ledger deltas for an owner, including uncommitted entries.
    async fn sum_deltas(&mut self, owner_id: i64) -> Result<i64>;

    async fn insert_ownership(&mut self, record: &OwnershipRecord) -> Result<()>;

    /// Reads the order and holds its lock until the transaction ends.
    async fn lock_order(&mut self, order_no: &str) -> Result<Option<Order>>;

    /// Applies the transition only if the order is still pending. Returns
    /// whether the transition took place.
    async fn transition_order(
        &mut self,
        order_no: &str,
        transition: &OrderTransition,
    ) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
