use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Largest balance a wallet may hold (2^53 - 1), kept so that balances stay
/// exact in clients that decode JSON numbers as doubles.
pub const MAX_SAFE_BALANCE: i64 = 9_007_199_254_740_991;

/// Current balance of a single owner, in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub owner_id: i64,
    pub balance: i64,
    /// Set when reconciliation failed; no mutation is allowed until cleared.
    pub frozen: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates an empty wallet for an owner.
    pub fn new(owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            owner_id,
            balance: 0,
            frozen: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the wallet can cover the amount.
    pub fn has_sufficient_funds(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    /// Balance after crediting `amount`, or None past the safe ceiling.
    pub fn balance_after_credit(&self, amount: i64) -> Option<i64> {
        self.balance
            .checked_add(amount)
            .filter(|balance| *balance <= MAX_SAFE_BALANCE)
    }

    /// Balance after debiting `amount`, or None if it would go negative.
    pub fn balance_after_debit(&self, amount: i64) -> Option<i64> {
        self.balance.checked_sub(amount).filter(|balance| *balance >= 0)
    }
}
