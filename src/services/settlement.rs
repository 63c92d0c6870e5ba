//! Applies payment-gateway notifications to orders and wallets exactly once.
//!
//! The gateway delivers at least once and retries on any negative
//! acknowledgment. The order row lock plus the `PENDING`-only transition make
//! duplicate deliveries collapse into a single terminal transition, and the
//! order update, wallet credit and ledger entry commit in one transaction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::gateway::{
    GatewayAdapter, GatewayTransaction, NotificationHeaders, TradeState, WebhookNotification,
};
use crate::models::{OrderStatus, OrderTransition};
use crate::observability::{get_metrics, mask_sensitive, payload_digest, LatencyTimer};
use crate::repositories::{Store, StoreTransaction};
use crate::services::WalletLedger;

const SETTLEMENT_REASON: &str = "payment settlement";

/// What an acknowledged notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementResult {
    /// Order moved to SUCCESS and the owner's wallet was credited.
    Credited { owner_id: i64, amount: i64 },
    /// Order moved to a terminal failure status.
    Closed(OrderStatus),
    /// Order was already terminal; nothing written.
    AlreadyTerminal,
    /// Trade state does not end the order; nothing written.
    Ignored(TradeState),
}

impl SettlementResult {
    fn label(&self) -> &'static str {
        match self {
            SettlementResult::Credited { .. } => "credited",
            SettlementResult::Closed(_) => "closed",
            SettlementResult::AlreadyTerminal => "already_terminal",
            SettlementResult::Ignored(_) => "ignored",
        }
    }
}

/// Acknowledgment returned to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// True tells the gateway to stop retrying.
    pub ack: bool,
    /// Error code when `ack` is false.
    pub reason: Option<String>,
    pub result: Option<SettlementResult>,
}

impl SettlementOutcome {
    fn acknowledged(result: SettlementResult) -> Self {
        Self {
            ack: true,
            reason: None,
            result: Some(result),
        }
    }

    fn rejected(err: &AppError) -> Self {
        Self {
            ack: false,
            reason: Some(err.code().to_string()),
            result: None,
        }
    }
}

/// Coordinates the gateway adapter, order store and wallet ledger.
pub struct SettlementCoordinator {
    store: Arc<dyn Store>,
    ledger: Arc<WalletLedger>,
    gateway: Arc<dyn GatewayAdapter>,
}

impl SettlementCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<WalletLedger>,
        gateway: Arc<dyn GatewayAdapter>,
    ) -> Self {
        Self {
            store,
            ledger,
            gateway,
        }
    }

    /// Settles one raw notification. Never returns an error: failures become
    /// a negative acknowledgment so the gateway retries.
    #[instrument(skip_all, fields(digest = %payload_digest(body)))]
    pub async fn settle(&self, body: &[u8], headers: &NotificationHeaders) -> SettlementOutcome {
        let timer = LatencyTimer::new();
        let metrics = get_metrics();

        let outcome = match self.try_settle(body, headers).await {
            Ok(result) => {
                info!(result = ?result, "Notification acknowledged");
                metrics.record_settlement(result.label());
                SettlementOutcome::acknowledged(result)
            }
            Err(err) => {
                if err.is_client_error() {
                    warn!(code = err.code(), "Notification rejected: {}", err);
                } else {
                    error!(code = err.code(), "Notification failed: {}", err);
                }
                metrics.record_settlement(err.code());
                SettlementOutcome::rejected(&err)
            }
        };

        metrics.record_settlement_latency(timer.elapsed_ms());
        outcome
    }

    async fn try_settle(
        &self,
        body: &[u8],
        headers: &NotificationHeaders,
    ) -> Result<SettlementResult> {
        headers.require()?;

        let notification = WebhookNotification::from_slice(body)?;
        let txn = self.gateway.decrypt(&notification.resource)?;
        info!(
            order_no = %txn.out_trade_no,
            trade_state = ?txn.trade_state,
            transaction_id = %txn.transaction_id.as_deref().map(|id| mask_sensitive(id, 4)).unwrap_or_default(),
            "Notification decrypted"
        );

        let mut tx = self.store.begin().await?;
        match self.apply(tx.as_mut(), &txn).await {
            Ok(result) => {
                tx.commit().await?;
                if matches!(result, SettlementResult::Credited { .. }) {
                    get_metrics().record_credit("settlement");
                }
                Ok(result)
            }
            Err(e) => {
                drop(tx);
                Err(self.ledger.quarantine(e).await)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn StoreTransaction,
        txn: &GatewayTransaction,
    ) -> Result<SettlementResult> {
        let order = tx
            .lock_order(&txn.out_trade_no)
            .await?
            .ok_or_else(|| AppError::OrderNotFound(txn.out_trade_no.clone()))?;

        if order.status.is_terminal() {
            return Ok(SettlementResult::AlreadyTerminal);
        }

        let paid = txn.paid_amount();
        if paid != order.total_amount {
            return Err(AppError::AmountMismatch {
                order_no: order.order_no,
                expected: order.total_amount,
                received: paid,
            });
        }

        let Some(target) = txn.trade_state.terminal_status() else {
            return Ok(SettlementResult::Ignored(txn.trade_state));
        };

        let transition = match target {
            OrderStatus::Success => {
                OrderTransition::paid(txn.transaction_id.clone(), txn.paid_at())
            }
            status => OrderTransition::failed(status),
        };
        if !tx.transition_order(&order.order_no, &transition).await? {
            return Ok(SettlementResult::AlreadyTerminal);
        }

        if target != OrderStatus::Success {
            return Ok(SettlementResult::Closed(target));
        }

        self.ledger
            .recharge_in(tx, order.owner_id, order.total_amount, Some(SETTLEMENT_REASON))
            .await?;

        Ok(SettlementResult::Credited {
            owner_id: order.owner_id,
            amount: order.total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{EncryptedResource, MockGatewayAdapter, TransactionAmount};
    use crate::models::Order;
    use crate::repositories::MemoryStore;
    use crate::services::{InMemoryCatalog, LedgerLimits};

    fn body() -> Vec<u8> {
        serde_json::json!({
            "id": "evt-1",
            "resource": {
                "algorithm": "AEAD_AES_256_GCM",
                "ciphertext": "AAAA",
                "associated_data": "transaction",
                "nonce": "abcdefghijkl"
            }
        })
        .to_string()
        .into_bytes()
    }

    fn headers() -> NotificationHeaders {
        NotificationHeaders::new("sig", "1700000000", "n-1", "SERIAL")
    }

    fn transaction(order_no: &str, trade_state: TradeState, total: i64) -> GatewayTransaction {
        GatewayTransaction {
            out_trade_no: order_no.to_string(),
            trade_state,
            transaction_id: Some("4200000001".to_string()),
            success_time: None,
            amount: Some(TransactionAmount {
                total,
                payer_total: Some(total),
                currency: Some("CNY".to_string()),
            }),
        }
    }

    async fn coordinator(
        gateway: MockGatewayAdapter,
    ) -> (Arc<MemoryStore>, Arc<WalletLedger>, SettlementCoordinator) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(WalletLedger::new(
            store.clone(),
            Arc::new(InMemoryCatalog::new()),
            LedgerLimits::default(),
        ));
        let coordinator =
            SettlementCoordinator::new(store.clone(), ledger.clone(), Arc::new(gateway));
        (store, ledger, coordinator)
    }

    #[tokio::test]
    async fn test_missing_headers_skip_decryption() {
        let mut gateway = MockGatewayAdapter::new();
        gateway.expect_decrypt().never();
        let (_, _, coordinator) = coordinator(gateway).await;

        let mut partial = headers();
        partial.nonce = None;
        let outcome = coordinator.settle(&body(), &partial).await;

        assert!(!outcome.ack);
        assert_eq!(outcome.reason.as_deref(), Some("MISSING_SIGNATURE"));
    }

    #[tokio::test]
    async fn test_decryption_failure_is_negative_ack() {
        let mut gateway = MockGatewayAdapter::new();
        gateway
            .expect_decrypt()
            .times(1)
            .returning(|_: &EncryptedResource| Err(AppError::DecryptionError("bad tag".into())));
        let (store, _, coordinator) = coordinator(gateway).await;
        store.insert_order(&Order::pending("O-1", 7, 1999)).await.unwrap();

        let outcome = coordinator.settle(&body(), &headers()).await;
        assert!(!outcome.ack);
        assert_eq!(outcome.reason.as_deref(), Some("DECRYPTION_ERROR"));
        assert_eq!(
            store.find_order("O-1").await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_success_credits_owner() {
        let mut gateway = MockGatewayAdapter::new();
        gateway
            .expect_decrypt()
            .returning(|_| Ok(transaction("O-1", TradeState::Success, 1999)));
        let (store, ledger, coordinator) = coordinator(gateway).await;
        store.insert_order(&Order::pending("O-1", 7, 1999)).await.unwrap();

        let outcome = coordinator.settle(&body(), &headers()).await;
        assert!(outcome.ack);
        assert_eq!(
            outcome.result,
            Some(SettlementResult::Credited {
                owner_id: 7,
                amount: 1999
            })
        );

        let order = store.find_order("O-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Success);
        assert_eq!(order.transaction_id.as_deref(), Some("4200000001"));
        assert!(order.paid_at.is_some());
        assert_eq!(ledger.get_balance(7).await.unwrap(), 1999);

        let entries = ledger.ledger_entries(7, 10, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, "payment settlement +1999");
    }

    #[tokio::test]
    async fn test_user_paying_is_acknowledged_without_change() {
        let mut gateway = MockGatewayAdapter::new();
        gateway
            .expect_decrypt()
            .returning(|_| Ok(transaction("O-1", TradeState::UserPaying, 1999)));
        let (store, ledger, coordinator) = coordinator(gateway).await;
        store.insert_order(&Order::pending("O-1", 7, 1999)).await.unwrap();

        let outcome = coordinator.settle(&body(), &headers()).await;
        assert!(outcome.ack);
        assert_eq!(
            outcome.result,
            Some(SettlementResult::Ignored(TradeState::UserPaying))
        );
        assert_eq!(
            store.find_order("O-1").await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
        assert_eq!(ledger.get_balance(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_over_cap_rolls_back_transition() {
        let mut gateway = MockGatewayAdapter::new();
        gateway
            .expect_decrypt()
            .returning(|_| Ok(transaction("O-9", TradeState::Success, 200_000)));
        let (store, ledger, coordinator) = coordinator(gateway).await;
        store.insert_order(&Order::pending("O-9", 7, 200_000)).await.unwrap();

        let outcome = coordinator.settle(&body(), &headers()).await;
        assert!(!outcome.ack);
        assert_eq!(outcome.reason.as_deref(), Some("INVALID_AMOUNT"));
        assert_eq!(
            store.find_order("O-9").await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
        assert_eq!(ledger.get_balance(7).await.unwrap(), 0);
    }
}
