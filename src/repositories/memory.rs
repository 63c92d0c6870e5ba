use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTransaction};
use crate::error::{AppError, Result};
use crate::models::{LedgerEntry, Order, OrderTransition, OwnershipRecord, Wallet};

#[derive(Debug, Clone, Default)]
struct State {
    wallets: HashMap<i64, Wallet>,
    entries: Vec<LedgerEntry>,
    orders: HashMap<String, Order>,
    ownership: Vec<OwnershipRecord>,
}

/// In-process store for tests and embedded use.
///
/// A transaction holds the single writer lock for its whole lifetime and
/// works on a staged copy of the state, which replaces the shared state only
/// on commit. `begin` copies every owner's rows, so each transaction costs
/// time proportional to the total history held; benchmarks over this store
/// measure that copy as well as the ledger logic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a wallet balance without writing a ledger entry.
    /// Only meant for fault injection when exercising reconciliation.
    #[doc(hidden)]
    pub async fn force_balance(&self, owner_id: i64, balance: i64) {
        let mut state = self.state.lock().await;
        let wallet = state
            .wallets
            .entry(owner_id)
            .or_insert_with(|| Wallet::new(owner_id));
        wallet.balance = balance;
    }

    /// Number of ledger entries across all owners.
    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

fn sum_for(entries: &[LedgerEntry], owner_id: i64) -> i64 {
    entries
        .iter()
        .filter(|entry| entry.owner_id == owner_id)
        .map(|entry| entry.delta)
        .sum()
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn find_wallet(&self, owner_id: i64) -> Result<Option<Wallet>> {
        Ok(self.state.lock().await.wallets.get(&owner_id).cloned())
    }

    async fn list_entries(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.owner_id == owner_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_ownership(&self, owner_id: i64) -> Result<Vec<OwnershipRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .ownership
            .iter()
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_order(&self, order_no: &str) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(order_no).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<Order> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.order_no) {
            return Err(AppError::Internal(format!(
                "order '{}' already exists",
                order.order_no
            )));
        }
        state.orders.insert(order.order_no.clone(), order.clone());
        Ok(order.clone())
    }

    async fn set_wallet_frozen(&self, owner_id: i64, frozen: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.wallets.get_mut(&owner_id) {
            Some(wallet) => {
                wallet.frozen = frozen;
                wallet.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Writer transaction over a staged copy of the store.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_wallet(&mut self, owner_id: i64) -> Result<Option<Wallet>> {
        Ok(self.staged.wallets.get(&owner_id).cloned())
    }

    async fn lock_or_create_wallet(&mut self, owner_id: i64) -> Result<Wallet> {
        Ok(self
            .staged
            .wallets
            .entry(owner_id)
            .or_insert_with(|| Wallet::new(owner_id))
            .clone())
    }

    async fn update_balance(&mut self, owner_id: i64, balance: i64) -> Result<Wallet> {
        let wallet = self
            .staged
            .wallets
            .get_mut(&owner_id)
            .ok_or(AppError::WalletNotFound(owner_id))?;
        wallet.balance = balance;
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.staged.entries.push(entry.clone());
        Ok(())
    }

    async fn sum_deltas(&mut self, owner_id: i64) -> Result<i64> {
        Ok(sum_for(&self.staged.entries, owner_id))
    }

    async fn insert_ownership(&mut self, record: &OwnershipRecord) -> Result<()> {
        self.staged.ownership.push(record.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_no: &str) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(order_no).cloned())
    }

    async fn transition_order(
        &mut self,
        order_no: &str,
        transition: &OrderTransition,
    ) -> Result<bool> {
        Ok(self
            .staged
            .orders
            .get_mut(order_no)
            .map(|order| order.apply(transition))
            .unwrap_or(false))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.lock_or_create_wallet(7).await.unwrap();
        tx.update_balance(7, 500).await.unwrap();
        tx.append_entry(&LedgerEntry::credit(7, 500, 500, "recharge"))
            .await
            .unwrap();
        drop(tx);

        assert!(store.find_wallet(7).await.unwrap().is_none());
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.lock_or_create_wallet(7).await.unwrap();
        tx.update_balance(7, 500).await.unwrap();
        tx.append_entry(&LedgerEntry::credit(7, 500, 500, "recharge"))
            .await
            .unwrap();
        assert_eq!(tx.sum_deltas(7).await.unwrap(), 500);
        tx.commit().await.unwrap();

        assert_eq!(store.find_wallet(7).await.unwrap().unwrap().balance, 500);
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_transition_only_from_pending() {
        let store = MemoryStore::new();
        store
            .insert_order(&Order::pending("O-1", 7, 1999))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let paid = OrderTransition::paid(Some("wx-1".into()), Utc::now());
        assert!(tx.transition_order("O-1", &paid).await.unwrap());
        assert!(!tx.transition_order("O-1", &paid).await.unwrap());
        assert!(!tx.transition_order("O-404", &paid).await.unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_order_rejected() {
        let store = MemoryStore::new();
        let order = Order::pending("O-1", 7, 1999);
        store.insert_order(&order).await.unwrap();
        assert!(store.insert_order(&order).await.is_err());
    }
}
