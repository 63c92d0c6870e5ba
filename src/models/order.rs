use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment status of a recharge order.
///
/// `Pending` is the only non-terminal state; every other state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Created, waiting for the gateway.
    Pending,
    /// Paid and credited to the owner's wallet.
    Success,
    /// Closed by the gateway without payment.
    Closed,
    /// Revoked by the payer.
    Revoked,
    /// Payment failed at the gateway.
    PayError,
}

impl OrderStatus {
    /// Returns true if no transition out of this status exists.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Returns true if `next` is reachable from this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(self, OrderStatus::Pending) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Closed => "CLOSED",
            OrderStatus::Revoked => "REVOKED",
            OrderStatus::PayError => "PAYERROR",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recharge order, keyed by the merchant-assigned business order number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_no: String,
    pub owner_id: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    /// Gateway transaction id, set once the order is paid.
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order.
    pub fn pending(order_no: impl Into<String>, owner_id: i64, total_amount: i64) -> Self {
        let now = Utc::now();
        Self {
            order_no: order_no.into(),
            owner_id,
            total_amount,
            status: OrderStatus::Pending,
            transaction_id: None,
            paid_at: None,
            remark: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a transition in place. Returns false, leaving the order
    /// untouched, when the order has already reached a terminal status.
    pub fn apply(&mut self, transition: &OrderTransition) -> bool {
        if !self.status.can_transition_to(transition.status) {
            return false;
        }
        self.status = transition.status;
        if transition.transaction_id.is_some() {
            self.transaction_id = transition.transaction_id.clone();
        }
        if transition.paid_at.is_some() {
            self.paid_at = transition.paid_at;
        }
        self.remark = Some(transition.remark.clone());
        self.updated_at = Utc::now();
        true
    }
}

/// Terminal transition requested for a pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTransition {
    pub status: OrderStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub remark: String,
}

impl OrderTransition {
    /// Order paid in full.
    pub fn paid(transaction_id: Option<String>, paid_at: DateTime<Utc>) -> Self {
        Self {
            status: OrderStatus::Success,
            transaction_id,
            paid_at: Some(paid_at),
            remark: "payment succeeded".to_string(),
        }
    }

    /// Order ended without payment.
    pub fn failed(status: OrderStatus) -> Self {
        let remark = match status {
            OrderStatus::Closed => "payment closed",
            OrderStatus::Revoked => "payment revoked",
            _ => "payment failed",
        };
        Self {
            status,
            transaction_id: None,
            paid_at: None,
            remark: remark.to_string(),
        }
    }
}
