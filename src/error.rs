use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised by the wallet ledger and the settlement path.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid amount {amount}: must be a positive integer no greater than {max}")]
    InvalidAmount { amount: i64, max: i64 },

    #[error("Balance overflow for owner {owner_id}")]
    Overflow { owner_id: i64 },

    #[error("Wallet for owner {0} not found")]
    WalletNotFound(i64),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Catalog item {0} not found")]
    ItemNotFound(i64),

    #[error("Catalog item {0} is not payable")]
    NotPayable(i64),

    #[error("Missing signature header: {0}")]
    MissingSignature(&'static str),

    #[error("Notification decryption failed: {0}")]
    DecryptionError(String),

    #[error("Order '{0}' not found")]
    OrderNotFound(String),

    #[error("Amount mismatch for order '{order_no}': expected {expected}, received {received}")]
    AmountMismatch {
        order_no: String,
        expected: i64,
        received: i64,
    },

    #[error("Ledger integrity violated for owner {owner_id}: {detail}")]
    IntegrityError { owner_id: i64, detail: String },

    #[error("Wallet for owner {0} is frozen pending reconciliation")]
    WalletFrozen(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for API bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidAmount { .. } => "INVALID_AMOUNT",
            AppError::Overflow { .. } => "OVERFLOW",
            AppError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            AppError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            AppError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            AppError::NotPayable(_) => "NOT_PAYABLE",
            AppError::MissingSignature(_) => "MISSING_SIGNATURE",
            AppError::DecryptionError(_) => "DECRYPTION_ERROR",
            AppError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            AppError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            AppError::IntegrityError { .. } => "INTEGRITY_ERROR",
            AppError::WalletFrozen(_) => "WALLET_FROZEN",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the error was caused by the caller's input or the
    /// current state of their wallet, as opposed to an infrastructure fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAmount { .. }
                | AppError::Overflow { .. }
                | AppError::WalletNotFound(_)
                | AppError::InsufficientFunds { .. }
                | AppError::ItemNotFound(_)
                | AppError::NotPayable(_)
                | AppError::MissingSignature(_)
                | AppError::DecryptionError(_)
                | AppError::OrderNotFound(_)
                | AppError::AmountMismatch { .. }
                | AppError::WalletFrozen(_)
        )
    }

    /// Owner whose wallet must be frozen, if this is a newly detected
    /// integrity violation. A refusal on an already frozen wallet is not one.
    pub fn integrity_owner(&self) -> Option<i64> {
        match self {
            AppError::IntegrityError { owner_id, .. } => Some(*owner_id),
            _ => None,
        }
    }
}
