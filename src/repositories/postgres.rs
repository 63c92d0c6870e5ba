use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    LedgerRepository, OrderRepository, OwnershipRepository, Store, StoreTransaction,
    WalletRepository,
};
use crate::error::{AppError, Result};
use crate::models::{LedgerEntry, Order, OrderTransition, OwnershipRecord, Wallet};

/// PostgreSQL-backed store. Serialization relies on `SELECT ... FOR UPDATE`
/// row locks held until the surrounding transaction ends.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(AppError::Database)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn find_wallet(&self, owner_id: i64) -> Result<Option<Wallet>> {
        WalletRepository::find(&self.pool, owner_id).await
    }

    async fn list_entries(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        LedgerRepository::find_by_owner(&self.pool, owner_id, limit, offset).await
    }

    async fn list_ownership(&self, owner_id: i64) -> Result<Vec<OwnershipRecord>> {
        OwnershipRepository::find_by_owner(&self.pool, owner_id).await
    }

    async fn find_order(&self, order_no: &str) -> Result<Option<Order>> {
        OrderRepository::find_by_order_no(&self.pool, order_no).await
    }

    async fn insert_order(&self, order: &Order) -> Result<Order> {
        OrderRepository::create(&self.pool, order).await
    }

    async fn set_wallet_frozen(&self, owner_id: i64, frozen: bool) -> Result<bool> {
        WalletRepository::set_frozen(&self.pool, owner_id, frozen).await
    }
}

/// An open PostgreSQL transaction. Rolled back by sqlx on drop.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn lock_wallet(&mut self, owner_id: i64) -> Result<Option<Wallet>> {
        WalletRepository::lock(&mut *self.tx, owner_id).await
    }

    async fn lock_or_create_wallet(&mut self, owner_id: i64) -> Result<Wallet> {
        WalletRepository::insert_if_absent(&mut *self.tx, owner_id).await?;
        WalletRepository::lock(&mut *self.tx, owner_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("wallet {} vanished after insert", owner_id)))
    }

    async fn update_balance(&mut self, owner_id: i64, balance: i64) -> Result<Wallet> {
        WalletRepository::update_balance(&mut *self.tx, owner_id, balance).await
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        LedgerRepository::append(&mut *self.tx, entry).await
    }

    async fn sum_deltas(&mut self, owner_id: i64) -> Result<i64> {
        LedgerRepository::sum_deltas(&mut *self.tx, owner_id).await
    }

    async fn insert_ownership(&mut self, record: &OwnershipRecord) -> Result<()> {
        OwnershipRepository::insert(&mut *self.tx, record).await
    }

    async fn lock_order(&mut self, order_no: &str) -> Result<Option<Order>> {
        OrderRepository::lock(&mut *self.tx, order_no).await
    }

    async fn transition_order(
        &mut self,
        order_no: &str,
        transition: &OrderTransition,
    ) -> Result<bool> {
        OrderRepository::transition_from_pending(&mut *self.tx, order_no, transition).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(AppError::Database)
    }
}
