//! Member wallet ledger.
//!
//! Every balance change runs inside one store transaction that
//! 1. locks the owner's wallet row,
//! 2. checks the request against the locked balance,
//! 3. writes the new balance and appends exactly one ledger entry,
//! 4. verifies that the owner's ledger deltas still sum to the balance,
//! and only then commits. A failure at any step drops the transaction, so
//! callers never observe partial effects.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{CatalogItem, LedgerEntry, OwnershipRecord, Wallet};
use crate::observability::{get_metrics, mask_amount, LatencyTimer};
use crate::repositories::{Store, StoreTransaction};
use crate::services::Catalog;

/// Per-operation amount caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLimits {
    pub max_recharge_amount: i64,
    pub max_deduct_amount: i64,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_recharge_amount: 100_000,
            max_deduct_amount: 10_000,
        }
    }
}

/// Wallet state and ledger entry produced by a committed mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub wallet: Wallet,
    pub entry: LedgerEntry,
}

/// Result of a committed purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub item: CatalogItem,
    pub ownership: OwnershipRecord,
    pub receipt: LedgerReceipt,
}

/// Comparison of a wallet balance with the sum of its ledger deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub owner_id: i64,
    pub balance: i64,
    pub ledger_sum: i64,
    pub frozen: bool,
    pub consistent: bool,
}

/// Writes that must commit atomically with a debit.
///
/// The ledger performs the balance write and ledger append itself; a unit of
/// work only adds its own rows to the same transaction.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Reason recorded on the debit entry, replacing the caller's reason.
    fn ledger_reason(&self, _wallet: &Wallet) -> Option<String> {
        None
    }

    /// Performs the extra writes. `wallet` is the locked pre-debit snapshot.
    async fn apply(&self, tx: &mut dyn StoreTransaction, wallet: &Wallet) -> Result<()>;
}

/// Unit of work granting a purchased catalog item.
#[derive(Debug, Clone)]
pub struct GrantOwnership {
    item: CatalogItem,
    record: OwnershipRecord,
}

impl GrantOwnership {
    pub fn new(owner_id: i64, item: CatalogItem) -> Self {
        let record = OwnershipRecord::new(owner_id, item.id);
        Self { item, record }
    }

    pub fn record(&self) -> &OwnershipRecord {
        &self.record
    }
}

#[async_trait]
impl UnitOfWork for GrantOwnership {
    fn ledger_reason(&self, _wallet: &Wallet) -> Option<String> {
        Some(format!("purchase item:{} -{}", self.item.title, self.item.price))
    }

    async fn apply(&self, tx: &mut dyn StoreTransaction, _wallet: &Wallet) -> Result<()> {
        tx.insert_ownership(&self.record).await
    }
}

/// Balance ledger for member wallets.
pub struct WalletLedger {
    store: Arc<dyn Store>,
    catalog: Arc<dyn Catalog>,
    limits: LedgerLimits,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<dyn Catalog>, limits: LedgerLimits) -> Self {
        Self {
            store,
            catalog,
            limits,
        }
    }

    /// Current balance; 0 when the owner has no wallet. Never creates one.
    pub async fn get_balance(&self, owner_id: i64) -> Result<i64> {
        Ok(self
            .store
            .find_wallet(owner_id)
            .await?
            .map(|wallet| wallet.balance)
            .unwrap_or(0))
    }

    pub async fn wallet(&self, owner_id: i64) -> Result<Option<Wallet>> {
        self.store.find_wallet(owner_id).await
    }

    /// Ledger history of an owner, newest first.
    pub async fn ledger_entries(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        self.store.list_entries(owner_id, limit, offset).await
    }

    pub async fn owned_items(&self, owner_id: i64) -> Result<Vec<OwnershipRecord>> {
        self.store.list_ownership(owner_id).await
    }

    /// Credits a wallet, creating it on first use.
    #[instrument(skip(self, reason))]
    pub async fn recharge(
        &self,
        owner_id: i64,
        amount: i64,
        reason: Option<&str>,
    ) -> Result<LedgerReceipt> {
        if let Err(e) = validate_amount(amount, self.limits.max_recharge_amount) {
            return Err(self.reject("recharge", e).await);
        }

        let timer = LatencyTimer::new();
        let mut tx = self.store.begin().await?;
        let receipt = match self.recharge_in(tx.as_mut(), owner_id, amount, reason).await {
            Ok(receipt) => receipt,
            Err(e) => {
                drop(tx);
                return Err(self.reject("recharge", e).await);
            }
        };
        tx.commit().await?;

        let metrics = get_metrics();
        metrics.record_credit("recharge");
        metrics.record_ledger_write_latency(timer.elapsed_ms());
        info!(
            owner_id,
            amount,
            balance = %mask_amount(receipt.wallet.balance),
            "Wallet recharged"
        );

        Ok(receipt)
    }

    /// Credit path inside a caller-owned transaction. The caller commits,
    /// and must pass any error through [`WalletLedger::quarantine`] after
    /// dropping the transaction.
    #[instrument(skip(self, tx, reason))]
    pub async fn recharge_in(
        &self,
        tx: &mut dyn StoreTransaction,
        owner_id: i64,
        amount: i64,
        reason: Option<&str>,
    ) -> Result<LedgerReceipt> {
        validate_amount(amount, self.limits.max_recharge_amount)?;

        let wallet = tx.lock_or_create_wallet(owner_id).await?;
        ensure_not_frozen(&wallet)?;

        let new_balance = wallet
            .balance_after_credit(amount)
            .ok_or(AppError::Overflow { owner_id })?;

        let wallet = tx.update_balance(owner_id, new_balance).await?;
        let entry = LedgerEntry::credit(
            owner_id,
            amount,
            new_balance,
            format!("{} +{}", reason.unwrap_or("recharge"), amount),
        );
        tx.append_entry(&entry).await?;
        verify_reconciliation(tx, owner_id, new_balance).await?;

        Ok(LedgerReceipt { wallet, entry })
    }

    /// Debits a wallet. When a unit of work is supplied its writes commit in
    /// the same transaction as the debit.
    #[instrument(skip(self, reason, unit_of_work))]
    pub async fn deduct(
        &self,
        owner_id: i64,
        amount: i64,
        reason: Option<&str>,
        unit_of_work: Option<&dyn UnitOfWork>,
    ) -> Result<LedgerReceipt> {
        let operation = if unit_of_work.is_some() {
            "purchase"
        } else {
            "deduct"
        };
        if let Err(e) = validate_amount(amount, self.limits.max_deduct_amount) {
            return Err(self.reject(operation, e).await);
        }

        let timer = LatencyTimer::new();
        let mut tx = self.store.begin().await?;
        let receipt = match self
            .deduct_in(tx.as_mut(), owner_id, amount, reason, unit_of_work)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                drop(tx);
                return Err(self.reject(operation, e).await);
            }
        };
        tx.commit().await?;

        let metrics = get_metrics();
        metrics.record_debit(operation);
        metrics.record_ledger_write_latency(timer.elapsed_ms());
        info!(
            owner_id,
            amount,
            balance = %mask_amount(receipt.wallet.balance),
            operation,
            "Wallet debited"
        );

        Ok(receipt)
    }

    async fn deduct_in(
        &self,
        tx: &mut dyn StoreTransaction,
        owner_id: i64,
        amount: i64,
        reason: Option<&str>,
        unit_of_work: Option<&dyn UnitOfWork>,
    ) -> Result<LedgerReceipt> {
        let wallet = tx
            .lock_wallet(owner_id)
            .await?
            .ok_or(AppError::WalletNotFound(owner_id))?;
        ensure_not_frozen(&wallet)?;

        if !wallet.has_sufficient_funds(amount) {
            return Err(AppError::InsufficientFunds {
                requested: amount,
                available: wallet.balance,
            });
        }

        let reason = unit_of_work
            .and_then(|work| work.ledger_reason(&wallet))
            .or_else(|| reason.map(str::to_string))
            .unwrap_or_else(|| "deduct".to_string());

        if let Some(work) = unit_of_work {
            work.apply(&mut *tx, &wallet).await?;
        }

        // Re-read right before the write; the unit of work shares this transaction.
        let current = tx
            .lock_wallet(owner_id)
            .await?
            .ok_or(AppError::WalletNotFound(owner_id))?;
        let new_balance =
            current
                .balance_after_debit(amount)
                .ok_or(AppError::InsufficientFunds {
                    requested: amount,
                    available: current.balance,
                })?;

        let wallet = tx.update_balance(owner_id, new_balance).await?;
        let entry = LedgerEntry::debit(owner_id, amount, new_balance, reason);
        tx.append_entry(&entry).await?;
        verify_reconciliation(tx, owner_id, new_balance).await?;

        Ok(LedgerReceipt { wallet, entry })
    }

    /// Buys a catalog item: debit, ownership grant and ledger entry commit
    /// together or not at all.
    #[instrument(skip(self))]
    pub async fn purchase_item(&self, owner_id: i64, item_id: i64) -> Result<PurchaseReceipt> {
        let item = match self.catalog.get_item(item_id).await? {
            Some(item) => item,
            None => return Err(self.reject("purchase", AppError::ItemNotFound(item_id)).await),
        };
        if !item.payable {
            return Err(self.reject("purchase", AppError::NotPayable(item_id)).await);
        }

        let grant = GrantOwnership::new(owner_id, item.clone());
        let receipt = self
            .deduct(owner_id, item.price, None, Some(&grant as &dyn UnitOfWork))
            .await?;

        Ok(PurchaseReceipt {
            item,
            ownership: grant.record,
            receipt,
        })
    }

    /// Compares balance and ledger sum under the wallet lock. Read-only.
    pub async fn reconcile(&self, owner_id: i64) -> Result<ReconciliationReport> {
        let mut tx = self.store.begin().await?;
        let wallet = tx
            .lock_wallet(owner_id)
            .await?
            .ok_or(AppError::WalletNotFound(owner_id))?;
        let ledger_sum = tx.sum_deltas(owner_id).await?;
        drop(tx);

        Ok(ReconciliationReport {
            owner_id,
            balance: wallet.balance,
            ledger_sum,
            frozen: wallet.frozen,
            consistent: ledger_sum == wallet.balance,
        })
    }

    /// Clears the frozen flag once an operator has repaired the wallet.
    /// Refuses while balance and ledger still disagree.
    pub async fn unfreeze_wallet(&self, owner_id: i64) -> Result<ReconciliationReport> {
        let report = self.reconcile(owner_id).await?;
        if !report.consistent {
            return Err(AppError::IntegrityError {
                owner_id,
                detail: format!(
                    "ledger sum {} != balance {}",
                    report.ledger_sum, report.balance
                ),
            });
        }

        self.store.set_wallet_frozen(owner_id, false).await?;
        warn!(owner_id, "Wallet unfrozen after reconciliation");

        Ok(ReconciliationReport {
            frozen: false,
            ..report
        })
    }

    /// Freezes the wallet named by an integrity error. Any other error is
    /// passed through untouched.
    pub async fn quarantine(&self, err: AppError) -> AppError {
        if let Some(owner_id) = err.integrity_owner() {
            get_metrics().record_integrity_violation();
            error!(owner_id, error = %err, "Ledger integrity violation, freezing wallet");
            if let Err(freeze_err) = self.store.set_wallet_frozen(owner_id, true).await {
                error!(owner_id, error = %freeze_err, "Failed to freeze wallet");
            }
        }
        err
    }

    async fn reject(&self, operation: &str, err: AppError) -> AppError {
        get_metrics().record_rejection(operation, err.code());
        if err.is_client_error() {
            info!(operation, code = err.code(), "Ledger operation rejected: {}", err);
        }
        self.quarantine(err).await
    }
}

fn validate_amount(amount: i64, max: i64) -> Result<()> {
    if amount <= 0 || amount > max {
        return Err(AppError::InvalidAmount { amount, max });
    }
    Ok(())
}

fn ensure_not_frozen(wallet: &Wallet) -> Result<()> {
    if wallet.frozen {
        return Err(AppError::WalletFrozen(wallet.owner_id));
    }
    Ok(())
}

async fn verify_reconciliation(
    tx: &mut dyn StoreTransaction,
    owner_id: i64,
    balance: i64,
) -> Result<()> {
    let ledger_sum = tx.sum_deltas(owner_id).await?;
    if ledger_sum != balance {
        return Err(AppError::IntegrityError {
            owner_id,
            detail: format!("ledger sum {} != balance {}", ledger_sum, balance),
        });
    }
    Ok(())
}
