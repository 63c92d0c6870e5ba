use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to credit a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RechargeRequest {
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(length(min = 1, max = 255, message = "reason must be 1-255 characters"))]
    pub reason: Option<String>,
}

/// Request to debit a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeductRequest {
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(length(min = 1, max = 255, message = "reason must be 1-255 characters"))]
    pub reason: Option<String>,
}

/// Request to buy a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseRequest {
    #[validate(range(min = 1, message = "item_id must be positive"))]
    pub item_id: i64,
}

/// Query parameters for listing ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListLedgerEntriesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListLedgerEntriesQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    /// Limit and offset clamped to sane bounds.
    pub fn page(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
