use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EntryKind, LedgerEntry, OwnershipRecord, Wallet};
use crate::services::{LedgerReceipt, PurchaseReceipt, ReconciliationReport};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: Option<bool>,
}

/// Wallet response DTO. A missing wallet is reported with a zero balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub owner_id: i64,
    pub balance: i64,
    pub frozen: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletResponse {
    pub fn empty(owner_id: i64) -> Self {
        Self {
            owner_id,
            balance: 0,
            frozen: false,
            updated_at: None,
        }
    }
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            owner_id: wallet.owner_id,
            balance: wallet.balance,
            frozen: wallet.frozen,
            updated_at: Some(wallet.updated_at),
        }
    }
}

/// Ledger entry response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub owner_id: i64,
    pub kind: EntryKind,
    pub amount: i64,
    pub delta: i64,
    pub resulting_balance: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            owner_id: entry.owner_id,
            kind: entry.kind,
            amount: entry.amount(),
            delta: entry.delta,
            resulting_balance: entry.resulting_balance,
            reason: entry.reason,
            created_at: entry.created_at,
        }
    }
}

/// Result of a committed recharge or deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceiptResponse {
    pub wallet: WalletResponse,
    pub entry: LedgerEntryResponse,
}

impl From<LedgerReceipt> for LedgerReceiptResponse {
    fn from(receipt: LedgerReceipt) -> Self {
        Self {
            wallet: receipt.wallet.into(),
            entry: receipt.entry.into(),
        }
    }
}

/// Result of a committed purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub item_id: i64,
    pub title: String,
    pub price: i64,
    pub ownership_id: Uuid,
    pub wallet: WalletResponse,
    pub entry: LedgerEntryResponse,
}

impl From<PurchaseReceipt> for PurchaseResponse {
    fn from(purchase: PurchaseReceipt) -> Self {
        let OwnershipRecord { id, .. } = purchase.ownership;
        Self {
            item_id: purchase.item.id,
            title: purchase.item.title,
            price: purchase.item.price,
            ownership_id: id,
            wallet: purchase.receipt.wallet.into(),
            entry: purchase.receipt.entry.into(),
        }
    }
}

/// Reconciliation report DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResponse {
    pub owner_id: i64,
    pub balance: i64,
    pub ledger_sum: i64,
    pub frozen: bool,
    pub consistent: bool,
}

impl From<ReconciliationReport> for ReconciliationResponse {
    fn from(report: ReconciliationReport) -> Self {
        Self {
            owner_id: report.owner_id,
            balance: report.balance,
            ledger_sum: report.ledger_sum,
            frozen: report.frozen,
            consistent: report.consistent,
        }
    }
}

/// Acknowledgment body expected by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub code: String,
    pub message: String,
}

impl NotifyResponse {
    pub fn success() -> Self {
        Self {
            code: "SUCCESS".to_string(),
            message: "OK".to_string(),
        }
    }

    /// Negative acknowledgment. The message stays generic so internal
    /// detail never reaches the gateway.
    pub fn fail() -> Self {
        Self {
            code: "FAIL".to_string(),
            message: "notification not processed".to_string(),
        }
    }
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, limit: i64, offset: i64) -> Self {
        Self {
            items,
            limit,
            offset,
        }
    }
}
